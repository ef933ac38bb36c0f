//! Parses a structured predicate tree into a [`WhereClause`].

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};
use suite_cache_db::{WhereClause, WhereOperator};
use suite_cache_error::{CacheError, Result};

use crate::schema::ColumnSpec;

/// Map each field slug to its canonical storage column: the first column
/// synthesized for that slug (for `status`/`firstcreated`/`lastupdated`,
/// this is the value/`on` half — the side predicates are meant to target).
pub(crate) fn column_map(columns: &[ColumnSpec]) -> HashMap<&str, &str> {
    let mut map = HashMap::new();
    for column in columns {
        map.entry(column.slug.as_str()).or_insert(column.name.as_str());
    }
    map
}

/// Parse `{field_slug: value_or_op_map}` into a conjunction of clauses.
/// Unknown field slugs are skipped silently; unknown operators raise [`CacheError::InvalidPredicate`].
pub fn parse_predicate(predicate: &Map<String, JsonValue>, columns: &[ColumnSpec]) -> Result<WhereClause> {
    let map = column_map(columns);
    let mut clauses = Vec::new();

    for (slug, value) in predicate {
        let Some(&column) = map.get(slug.as_str()) else { continue };
        clauses.push(parse_field(column, value)?);
    }

    Ok(WhereClause::And(clauses))
}

fn parse_field(column: &str, value: &JsonValue) -> Result<WhereClause> {
    if let JsonValue::Object(op_map) = value {
        if op_map.len() != 1 {
            return Err(CacheError::InvalidPredicate {
                message: format!("predicate for '{column}' must carry exactly one operator key"),
            });
        }
        let (op_key, op_value) = op_map.iter().next().expect("checked len == 1");
        let operator = WhereOperator::from_key(op_key)?;
        return Ok(WhereClause::Field { column: column.to_string(), operator, value: op_value.clone() });
    }
    Ok(WhereClause::Field { column: column.to_string(), operator: WhereOperator::Eq, value: value.clone() })
}
