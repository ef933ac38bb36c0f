//! The field-structure filter used by "describe table" paths:
//! reduces a Field descriptor to `{slug, label, field_type, params?}` where
//! `params` retains only a whitelist of keys.

use serde_json::{Map, Value as JsonValue};

use crate::schema::FieldDescriptor;

/// `params` keys retained on a described field. Everything else (colors,
/// icons, widths, help docs) is dropped.
const PARAM_WHITELIST: &[&str] = &["required", "unique", "primary", "linked_application", "entries_allowed", "choices"];

/// `choices` entries retain only `label` and `value`.
const CHOICE_WHITELIST: &[&str] = &["label", "value"];

/// A Field descriptor reduced to the public-facing shape of "describe table".
#[derive(Debug, Clone, serde::Serialize)]
pub struct DescribedField {
    pub slug: String,
    pub label: String,
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

/// Reduce a Table Structure's Field descriptors to the described shape.
#[must_use]
pub fn describe_fields(fields: &[FieldDescriptor]) -> Vec<DescribedField> {
    fields.iter().map(describe_field).collect()
}

fn describe_field(field: &FieldDescriptor) -> DescribedField {
    let params = field.params.as_ref().and_then(|p| p.as_object()).map(filter_params);
    DescribedField { slug: field.slug.clone(), label: field.label.clone(), field_type: field.field_type.clone(), params }
}

fn filter_params(params: &Map<String, JsonValue>) -> JsonValue {
    let mut out = Map::new();
    for key in PARAM_WHITELIST {
        let Some(value) = params.get(*key) else { continue };
        let value = if *key == "choices" { filter_choices(value) } else { value.clone() };
        out.insert((*key).to_string(), value);
    }
    JsonValue::Object(out)
}

fn filter_choices(choices: &JsonValue) -> JsonValue {
    let Some(items) = choices.as_array() else { return choices.clone() };
    let filtered: Vec<JsonValue> = items
        .iter()
        .map(|choice| {
            let Some(obj) = choice.as_object() else { return choice.clone() };
            let mut out = Map::new();
            for key in CHOICE_WHITELIST {
                if let Some(value) = obj.get(*key) {
                    out.insert((*key).to_string(), value.clone());
                }
            }
            JsonValue::Object(out)
        })
        .collect();
    JsonValue::Array(filtered)
}
