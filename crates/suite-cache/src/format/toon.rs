//! TOON: the dense pipe-delimited tabular text serialization.

use serde_json::Value as JsonValue;

use crate::types::Record;

use super::sanitize_record;

/// Render a record set as TOON: a header line, a schema line, then one
/// pipe-delimited line per record. Missing fields render as the empty cell.
/// Deterministic given an ordered field list.
#[must_use]
pub fn render_toon(records: &[Record], fields: &[String], filtered_count: i64, total_count: i64) -> String {
    let shown = records.len();
    let mut out = format!("{shown} of {filtered_count} filtered ({total_count} total)\n");
    out.push_str(&format!("records[{shown}]{{{}}}:\n", fields.join("|")));
    for record in records {
        let sanitized = sanitize_record(record);
        let cells: Vec<String> = fields.iter().map(|f| render_cell(sanitized.get(f))).collect();
        out.push_str(&cells.join("|"));
        out.push('\n');
    }
    out
}

fn render_cell(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Array(items)) => items.iter().map(render_scalar).collect::<Vec<_>>().join(", "),
        Some(JsonValue::Object(_)) => value.map(ToString::to_string).unwrap_or_default(),
        Some(other) => other.to_string(),
    }
}

fn render_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(id: &str, name: &str) -> Record {
        json!({"id": id, "title": name}).as_object().unwrap().clone()
    }

    #[test]
    fn header_reports_shown_filtered_and_total() {
        let records = vec![record("rec_1", "A")];
        let text = render_toon(&records, &["id".into(), "title".into()], 5, 12);
        assert!(text.starts_with("1 of 5 filtered (12 total)\n"));
    }

    #[test]
    fn schema_line_lists_fields_in_order() {
        let records = vec![record("rec_1", "A")];
        let text = render_toon(&records, &["id".into(), "title".into()], 1, 1);
        assert!(text.contains("records[1]{id|title}:\n"));
    }

    #[test]
    fn missing_field_renders_as_empty_cell() {
        let records = vec![record("rec_1", "A")];
        let text = render_toon(&records, &["id".into(), "priority".into()], 1, 1);
        assert!(text.contains("rec_1|\n"));
    }

    #[test]
    fn arrays_join_with_comma_space() {
        let record = json!({"id": "rec_1", "tags": ["urgent", "bug"]}).as_object().unwrap().clone();
        let text = render_toon(&[record], &["id".into(), "tags".into()], 1, 1);
        assert!(text.contains("rec_1|urgent, bug\n"));
    }

    #[test]
    fn strings_are_not_truncated() {
        let long = "x".repeat(500);
        let record = json!({"id": "rec_1", "notes": long.clone()}).as_object().unwrap().clone();
        let text = render_toon(&[record], &["id".into(), "notes".into()], 1, 1);
        assert!(text.contains(&long));
    }

    #[test]
    fn rich_document_fields_render_as_extracted_html() {
        let record = json!({
            "id": "rec_1",
            "description": {"data": {}, "html": "<p>Hi</p>", "preview": "Hi", "yjsData": "z"},
        })
        .as_object()
        .unwrap()
        .clone();
        let text = render_toon(&[record], &["id".into(), "description".into()], 1, 1);
        assert!(text.contains("rec_1|<p>Hi</p>\n"));
    }
}
