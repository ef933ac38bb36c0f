//! Response Formatter: renders record sets densely for
//! downstream consumers, and sanitizes composite rich-document field values
//! on read.

mod describe;
mod json;
mod timestamp;
mod toon;

pub use describe::{describe_fields, DescribedField};
pub use json::render_json;
pub use timestamp::format_timestamp;
pub use toon::render_toon;

use serde_json::Value as JsonValue;

use crate::types::Record;
use crate::value::{extract_html, is_composite_rich_document};

/// The field list a rendered record set carries: `id` + `title` (if present
/// in the source records) + the caller-requested fields, in that order, with
/// duplicates elided.
#[must_use]
pub fn field_order(requested: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut order = Vec::new();
    for field in ["id", "title"].into_iter().chain(requested.iter().map(String::as_str)) {
        if seen.insert(field.to_string()) {
            order.push(field.to_string());
        }
    }
    order
}

/// Replace every composite rich-document value in `record` with its bare
/// `html` leaf. Mapping values that are not composite (e.g. a
/// `status` envelope, or a mapping that carries `html` without `data`) are
/// left untouched.
#[must_use]
pub fn sanitize_record(record: &Record) -> Record {
    let mut out = Record::new();
    for (key, value) in record {
        let sanitized = if is_composite_rich_document(value) {
            JsonValue::String(extract_html(value))
        } else {
            value.clone()
        };
        out.insert(key.clone(), sanitized);
    }
    out
}

/// Stringify every value keyed by `datetime_slugs` through [`format_timestamp`]
/// in the configured timezone, leaving every other field untouched. The
/// caller derives `datetime_slugs` from the table's Structure via
/// [`crate::schema::is_datetime_type`].
#[must_use]
pub fn apply_timezone(record: &Record, datetime_slugs: &[String], tz: crate::config::TimeZoneSetting) -> Record {
    let mut out = record.clone();
    for slug in datetime_slugs {
        if let Some(JsonValue::String(raw)) = out.get(slug) {
            let formatted = format_timestamp(raw, tz);
            out.insert(slug.clone(), JsonValue::String(formatted));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn field_order_dedupes_and_leads_with_id_and_title() {
        let order = field_order(&["title".to_string(), "priority".to_string(), "id".to_string()]);
        assert_eq!(order, vec!["id", "title", "priority"]);
    }

    #[test]
    fn sanitize_record_extracts_html_from_composite_fields() {
        let record = json!({
            "id": "rec_1",
            "description": {"data": {}, "html": "<p>Hi</p>", "preview": "Hi", "yjsData": "z"},
            "status": {"value": "active", "updated_on": "2026-01-01T00:00:00Z"},
        })
        .as_object()
        .unwrap()
        .clone();

        let sanitized = sanitize_record(&record);
        assert_eq!(sanitized.get("description"), Some(&json!("<p>Hi</p>")));
        assert_eq!(sanitized.get("status"), Some(&json!({"value": "active", "updated_on": "2026-01-01T00:00:00Z"})));
    }

    #[test]
    fn apply_timezone_only_touches_named_slugs() {
        let record = json!({"id": "rec_1", "due_on": "2026-01-15T10:30:00Z", "title": "unchanged"}).as_object().unwrap().clone();
        let out = apply_timezone(&record, &["due_on".to_string()], crate::config::TimeZoneSetting::Utc);
        assert_eq!(out.get("due_on"), Some(&json!("2026-01-15 10:30:00 +0000")));
        assert_eq!(out.get("title"), Some(&json!("unchanged")));
    }
}
