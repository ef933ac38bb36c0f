//! JSON response rendering: `{count, total_count,
//! filtered_count?, items}`.

use serde_json::{json, Map, Value as JsonValue};

use crate::types::Record;

use super::sanitize_record;

/// Render a record set as the JSON shape from `items` carries
/// only the selected `fields`, in order. `filtered_count` is omitted when
/// `None` (e.g. an unpaginated full-set read where filtered == total).
#[must_use]
pub fn render_json(records: &[Record], fields: &[String], total_count: i64, filtered_count: Option<i64>) -> JsonValue {
    let items: Vec<JsonValue> = records.iter().map(|r| select_fields(r, fields)).collect();

    let mut body = Map::new();
    body.insert("count".to_string(), json!(records.len()));
    body.insert("total_count".to_string(), json!(total_count));
    if let Some(filtered) = filtered_count {
        body.insert("filtered_count".to_string(), json!(filtered));
    }
    body.insert("items".to_string(), JsonValue::Array(items));
    JsonValue::Object(body)
}

fn select_fields(record: &Record, fields: &[String]) -> JsonValue {
    let sanitized = sanitize_record(record);
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = sanitized.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    JsonValue::Object(out)
}
