//! Deterministic, injective identifier sanitization.
//!
//! Rather than quoting identifiers at query time, we sanitize them once at
//! schema-synthesis time into an alphabet that is always safe to interpolate
//! into DDL/DML directly. Values never take this path — they always travel
//! as bound parameters.

use std::collections::HashSet;

use suite_cache_error::CacheError;

/// Sanitize an upstream table id into a storage table name.
///
/// Keeps `[A-Za-z0-9_]`, maps every other character to `_`.
#[must_use]
pub fn sanitize_table_name(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if mapped.is_empty() {
        "_".to_string()
    } else {
        mapped
    }
}

/// Sanitize a field slug into a storage column name, lowercased, restricted
/// to `[a-z0-9_]`, prefixed with `f_` if it would otherwise start with a
/// digit. Returns [`CacheError::Identifier`] only when the input is empty.
pub fn sanitize_column_name(raw: &str) -> Result<String, CacheError> {
    if raw.is_empty() {
        return Err(CacheError::Identifier { input: raw.to_string() });
    }
    let lowered = raw.to_lowercase();
    let mut mapped: String = lowered
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' { c } else { '_' })
        .collect();
    if mapped.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        mapped = format!("f_{mapped}");
    }
    if mapped.is_empty() {
        mapped = "_".to_string();
    }
    Ok(mapped)
}

/// Sanitize a column name and deduplicate it against `used`, appending
/// `_2`, `_3`, … until free. Updates `used` with the final name.
pub fn sanitize_and_dedup_column(raw: &str, used: &mut HashSet<String>) -> Result<String, CacheError> {
    let base = sanitize_column_name(raw)?;
    let mut candidate = base.clone();
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_maps_unsafe_chars() {
        assert_eq!(sanitize_table_name("tbl-A.1"), "tbl_A_1");
        assert_eq!(sanitize_table_name(""), "_");
    }

    #[test]
    fn column_name_lowercases_and_prefixes_digits() {
        assert_eq!(sanitize_column_name("Priority").unwrap(), "priority");
        assert_eq!(sanitize_column_name("1st_place").unwrap(), "f_1st_place");
        assert_eq!(sanitize_column_name("Due-Date!").unwrap(), "due_date_");
    }

    #[test]
    fn dedup_suffixes_collisions() {
        let mut used = HashSet::new();
        let a = sanitize_and_dedup_column("Name", &mut used).unwrap();
        let b = sanitize_and_dedup_column("name", &mut used).unwrap();
        let c = sanitize_and_dedup_column("NAME", &mut used).unwrap();
        assert_eq!(a, "name");
        assert_eq!(b, "name_2");
        assert_eq!(c, "name_3");
    }

    proptest::proptest! {
        #[test]
        fn column_name_always_matches_safe_alphabet(raw in "\\PC{0,40}") {
            if let Ok(sanitized) = sanitize_column_name(&raw) {
                let ok = sanitized.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
                prop_assert!(ok);
                prop_assert!(!sanitized.contains(['\'', '"', '`', ';', '-']));
            }
        }
    }
}
