//! Value Extraction: turns a raw upstream field value into the
//! zero-or-more column values the Schema Synthesizer decided this field
//! needs, per [`ColumnRole`](crate::schema::ColumnRole).
//!
//! This is the Rust-native form of the "tagged value" design in spec §9:
//! rather than reflecting on the raw JSON shape at every call site, each
//! [`ColumnRole`] already encodes which variant of the source shape it
//! expects, so extraction is a single small match.

use serde_json::Value as JsonValue;

use crate::schema::ColumnRole;

/// A value recognized as composite rich-document if it is a mapping
/// containing at least `data` and `html`.
#[must_use]
pub fn is_composite_rich_document(value: &JsonValue) -> bool {
    value.is_object() && value.get("data").is_some() && value.get("html").is_some()
}

/// Extract the `html` leaf from a composite rich-document, or the empty
/// string if missing. Non-composite mappings are returned unchanged as their
/// JSON text (the caller is expected to have already checked
/// [`is_composite_rich_document`] before calling this for "extract" intent).
#[must_use]
pub fn extract_html(value: &JsonValue) -> String {
    value.get("html").and_then(JsonValue::as_str).unwrap_or("").to_string()
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Extract the value to store for one column, given the raw field value
/// keyed by the field's slug in the source record. Returns `None` when
/// nothing should be written (the field was absent, or this half of a split
/// value was absent), which binds as SQL `NULL`.
#[must_use]
pub fn extract_column_value(role: ColumnRole, raw: &JsonValue) -> Option<JsonValue> {
    if raw.is_null() {
        return None;
    }
    match role {
        ColumnRole::Scalar => Some(match raw {
            JsonValue::Array(_) | JsonValue::Object(_) => JsonValue::String(raw.to_string()),
            other => other.clone(),
        }),
        ColumnRole::YesNo => Some(JsonValue::from(i64::from(is_truthy(raw)))),
        ColumnRole::ActorOn => raw.get("on").cloned(),
        ColumnRole::ActorBy => raw.get("by").cloned(),
        ColumnRole::StatusValue => Some(raw.get("value").cloned().unwrap_or_else(|| raw.clone())),
        ColumnRole::StatusUpdatedOn => raw.get("updated_on").cloned(),
        ColumnRole::Composite => Some(JsonValue::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn composite_requires_both_data_and_html() {
        assert!(is_composite_rich_document(&json!({"data": {}, "html": "<p>x</p>", "preview": "x", "yjsData": "z"})));
        assert!(!is_composite_rich_document(&json!({"html": "<p>x</p>"})));
        assert!(!is_composite_rich_document(&json!("plain string")));
    }

    #[test]
    fn extract_html_defaults_to_empty_string() {
        assert_eq!(extract_html(&json!({"data": {}})), "");
        assert_eq!(extract_html(&json!({"html": "<b>hi</b>"})), "<b>hi</b>");
    }

    #[test]
    fn yesno_extraction_is_truthy_based() {
        assert_eq!(extract_column_value(ColumnRole::YesNo, &json!(true)), Some(json!(1)));
        assert_eq!(extract_column_value(ColumnRole::YesNo, &json!(false)), Some(json!(0)));
        assert_eq!(extract_column_value(ColumnRole::YesNo, &json!("")), Some(json!(0)));
        assert_eq!(extract_column_value(ColumnRole::YesNo, &json!("yes")), Some(json!(1)));
    }

    #[test]
    fn actor_stamp_splits_on_and_by() {
        let raw = json!({"on": "2026-01-01T00:00:00Z", "by": "user_1"});
        assert_eq!(extract_column_value(ColumnRole::ActorOn, &raw), Some(json!("2026-01-01T00:00:00Z")));
        assert_eq!(extract_column_value(ColumnRole::ActorBy, &raw), Some(json!("user_1")));
    }

    #[test]
    fn status_envelope_splits_value_and_updated_on() {
        let raw = json!({"value": "active", "updated_on": "2026-01-01T00:00:00Z"});
        assert_eq!(extract_column_value(ColumnRole::StatusValue, &raw), Some(json!("active")));
        assert_eq!(extract_column_value(ColumnRole::StatusUpdatedOn, &raw), Some(json!("2026-01-01T00:00:00Z")));
    }

    #[test]
    fn bare_status_scalar_is_its_own_value() {
        assert_eq!(extract_column_value(ColumnRole::StatusValue, &json!("pending")), Some(json!("pending")));
        assert_eq!(extract_column_value(ColumnRole::StatusUpdatedOn, &json!("pending")), None);
    }

    #[test]
    fn collections_are_json_serialized() {
        let raw = json!(["urgent", "bug"]);
        assert_eq!(extract_column_value(ColumnRole::Scalar, &raw), Some(json!("[\"urgent\",\"bug\"]")));
    }

    #[test]
    fn composite_retains_full_structure_as_json_text() {
        let raw = json!({"data": {"ops": []}, "html": "<p>Hi</p>", "preview": "Hi", "yjsData": "blob"});
        let stored = extract_column_value(ColumnRole::Composite, &raw).unwrap();
        let stored_str = stored.as_str().unwrap();
        assert!(stored_str.contains("<p>Hi</p>"));
        assert!(stored_str.contains("ops"));
    }

    #[test]
    fn nil_yields_no_column_value() {
        assert_eq!(extract_column_value(ColumnRole::Scalar, &JsonValue::Null), None);
    }
}
