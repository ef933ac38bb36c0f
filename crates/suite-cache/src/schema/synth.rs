//! Synthesizes a [`CacheTableSchema`] from an upstream Table's Structure.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use suite_cache_error::{CacheError, Result};
use suite_cache_db::sanitize_and_dedup_column;

use super::field_type::{column_kind_for, is_never_indexable, is_type_indexable, ColumnKind, ColumnRole};

/// A single Field descriptor from an upstream Table's Structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub slug: String,
    pub label: String,
    pub field_type: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

impl FieldDescriptor {
    fn normalized_type(&self) -> String {
        self.field_type.trim().to_lowercase()
    }

    fn is_primary(&self) -> bool {
        self.params.as_ref().and_then(|p| p.get("primary")).and_then(serde_json::Value::as_bool).unwrap_or(false)
    }
}

/// Ordered list of Field descriptors that define a Table's columns.
pub type Structure = Vec<FieldDescriptor>;

/// One synthesized storage column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Originating field slug (companions share their parent's slug).
    pub slug: String,
    /// Sanitized storage column name.
    pub name: String,
    pub kind: ColumnKind,
    pub role: ColumnRole,
    pub indexed: bool,
}

/// The persisted mapping from an upstream table id to its synthesized
/// storage table, as described in "Cache table schema".
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTableSchema {
    pub sql_table_name: String,
    pub columns: Vec<ColumnSpec>,
    /// Fingerprint of the Structure, used to detect schema change.
    pub fingerprint: String,
}

/// Turn a Table Structure into a [`CacheTableSchema`].
///
/// # Errors
///
/// Returns [`CacheError::Identifier`] only if sanitizing the table id itself
/// is impossible (never happens in practice: an empty input sanitizes to
/// `"_"`).
pub fn synthesize(table_id: &str, structure: &Structure) -> Result<CacheTableSchema> {
    let sql_table_name = suite_cache_db::sanitize_table_name(table_id);
    if sql_table_name.is_empty() {
        return Err(CacheError::Identifier { input: table_id.to_string() });
    }

    let mut used_names: HashSet<String> = HashSet::from(["id".to_string(), "cached_at".to_string(), "expires_at".to_string()]);
    let mut columns = Vec::new();

    for field in structure {
        columns.extend(synthesize_field(field, &mut used_names)?);
    }

    let fingerprint = fingerprint_structure(structure);

    Ok(CacheTableSchema { sql_table_name, columns, fingerprint })
}

fn synthesize_field(field: &FieldDescriptor, used_names: &mut HashSet<String>) -> Result<Vec<ColumnSpec>> {
    let normalized = field.normalized_type();
    let mut out = Vec::new();

    match normalized.as_str() {
        "firstcreated" | "lastupdated" => {
            let on_name = sanitize_and_dedup_column(&format!("{}_on", field.slug), used_names)?;
            let by_name = sanitize_and_dedup_column(&format!("{}_by", field.slug), used_names)?;
            let indexable = indexable(field, &normalized);
            out.push(ColumnSpec { slug: field.slug.clone(), name: on_name, kind: ColumnKind::Text, role: ColumnRole::ActorOn, indexed: indexable });
            out.push(ColumnSpec { slug: field.slug.clone(), name: by_name, kind: ColumnKind::Text, role: ColumnRole::ActorBy, indexed: false });
        }
        "status" => {
            let value_name = sanitize_and_dedup_column(&field.slug, used_names)?;
            let updated_name = sanitize_and_dedup_column(&format!("{}_updated_on", field.slug), used_names)?;
            let indexable = indexable(field, &normalized);
            out.push(ColumnSpec { slug: field.slug.clone(), name: value_name, kind: ColumnKind::Text, role: ColumnRole::StatusValue, indexed: indexable });
            out.push(ColumnSpec { slug: field.slug.clone(), name: updated_name, kind: ColumnKind::Text, role: ColumnRole::StatusUpdatedOn, indexed: false });
        }
        "richtextarea" => {
            let name = sanitize_and_dedup_column(&field.slug, used_names)?;
            out.push(ColumnSpec { slug: field.slug.clone(), name, kind: ColumnKind::Text, role: ColumnRole::Composite, indexed: false });
        }
        "yesno" => {
            let name = sanitize_and_dedup_column(&field.slug, used_names)?;
            out.push(ColumnSpec { slug: field.slug.clone(), name, kind: ColumnKind::Integer, role: ColumnRole::YesNo, indexed: indexable(field, &normalized) });
        }
        _ => {
            let name = sanitize_and_dedup_column(&field.slug, used_names)?;
            let kind = column_kind_for(&normalized);
            out.push(ColumnSpec { slug: field.slug.clone(), name, kind, role: ColumnRole::Scalar, indexed: indexable(field, &normalized) });
        }
    }

    Ok(out)
}

fn indexable(field: &FieldDescriptor, normalized_type: &str) -> bool {
    if is_never_indexable(normalized_type) {
        return false;
    }
    is_type_indexable(normalized_type) || field.slug == "title" || field.is_primary()
}

/// Hash the Structure so structure changes can be detected without a full
/// diff.
#[must_use]
pub fn fingerprint_structure(structure: &Structure) -> String {
    let mut hasher = Sha256::new();
    for field in structure {
        hasher.update(field.slug.as_bytes());
        hasher.update([0u8]);
        hasher.update(field.normalized_type().as_bytes());
        hasher.update([0u8]);
        if let Some(params) = &field.params {
            hasher.update(params.to_string().as_bytes());
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}
