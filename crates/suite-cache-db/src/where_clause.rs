//! WHERE clause abstract syntax tree and SQLite SQL generation.
//!
//! `suite-cache` translates a structured predicate tree into [`WhereClause`]
//! values; this module compiles them to parameterized SQL. Values always
//! travel as bound parameters — only sanitized column names are ever
//! interpolated directly into the SQL text.

use serde_json::Value as JsonValue;
use suite_cache_error::CacheError;

/// A single comparison or a conjunction of clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// `column <op> value` (or a multi-value op for `in`/`between`/`has_*`).
    Field { column: String, operator: WhereOperator, value: JsonValue },
    /// AND of sub-clauses. The cache core is deliberately AND-only;
    /// OR/NOT belong to higher-level, upstream-facing filters.
    And(Vec<WhereClause>),
}

impl WhereClause {
    /// `true` if this clause (or every sub-clause) carries no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(clauses) => clauses.is_empty(),
            Self::Field { .. } => false,
        }
    }
}

/// The operator table from spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    HasAnyOf,
    HasAllOf,
    HasNoneOf,
}

impl WhereOperator {
    /// Parse the operator key used in an op-map (`{op: value}`).
    pub fn from_key(key: &str) -> Result<Self, CacheError> {
        Ok(match key {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "between" => Self::Between,
            "is_null" => Self::IsNull,
            "is_not_null" => Self::IsNotNull,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            "has_any_of" => Self::HasAnyOf,
            "has_all_of" => Self::HasAllOf,
            "has_none_of" => Self::HasNoneOf,
            other => {
                return Err(CacheError::InvalidPredicate {
                    message: format!("unknown operator '{other}'"),
                });
            }
        })
    }
}

/// Generates SQLite SQL from a [`WhereClause`] tree.
///
/// A zero-sized struct whose `generate` method returns `(sql, params)`,
/// ready to bind in declaration order against a `?`-placeholder query.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhereGenerator;

impl WhereGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generate a SQL fragment (no leading `WHERE`) and its bound params.
    pub fn generate(&self, clause: &WhereClause) -> Result<(String, Vec<JsonValue>), CacheError> {
        let mut params = Vec::new();
        let sql = self.generate_clause(clause, &mut params)?;
        Ok((sql, params))
    }

    fn generate_clause(&self, clause: &WhereClause, params: &mut Vec<JsonValue>) -> Result<String, CacheError> {
        match clause {
            WhereClause::And(clauses) => {
                if clauses.is_empty() {
                    return Ok("1 = 1".to_string());
                }
                let mut parts = Vec::with_capacity(clauses.len());
                for c in clauses {
                    parts.push(self.generate_clause(c, params)?);
                }
                Ok(format!("({})", parts.join(" AND ")))
            }
            WhereClause::Field { column, operator, value } => self.generate_field(column, *operator, value, params),
        }
    }

    fn generate_field(
        &self,
        column: &str,
        operator: WhereOperator,
        value: &JsonValue,
        params: &mut Vec<JsonValue>,
    ) -> Result<String, CacheError> {
        use WhereOperator as Op;
        Ok(match operator {
            Op::Eq => {
                params.push(value.clone());
                format!("{column} = ?")
            }
            Op::Ne => {
                params.push(value.clone());
                format!("{column} != ?")
            }
            Op::Gt => {
                params.push(value.clone());
                format!("{column} > ?")
            }
            Op::Gte => {
                params.push(value.clone());
                format!("{column} >= ?")
            }
            Op::Lt => {
                params.push(value.clone());
                format!("{column} < ?")
            }
            Op::Lte => {
                params.push(value.clone());
                format!("{column} <= ?")
            }
            Op::Contains => {
                params.push(JsonValue::String(format!("%{}%", as_str(value))));
                format!("{column} LIKE ?")
            }
            Op::StartsWith => {
                params.push(JsonValue::String(format!("{}%", as_str(value))));
                format!("{column} LIKE ?")
            }
            Op::EndsWith => {
                params.push(JsonValue::String(format!("%{}", as_str(value))));
                format!("{column} LIKE ?")
            }
            Op::In | Op::NotIn => {
                let items = value.as_array().ok_or_else(|| CacheError::InvalidPredicate {
                    message: format!("'{}' expects an array value", if operator == Op::In { "in" } else { "not_in" }),
                })?;
                if items.is_empty() {
                    // An empty IN() is always false; NOT IN() is always true.
                    return Ok(if operator == Op::In { "0 = 1".to_string() } else { "1 = 1".to_string() });
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                params.extend(items.iter().cloned());
                let kw = if operator == Op::In { "IN" } else { "NOT IN" };
                format!("{column} {kw} ({placeholders})")
            }
            Op::Between => {
                let min = value.get("min").ok_or_else(|| CacheError::InvalidPredicate {
                    message: "'between' requires a 'min' key".to_string(),
                })?;
                let max = value.get("max").ok_or_else(|| CacheError::InvalidPredicate {
                    message: "'between' requires a 'max' key".to_string(),
                })?;
                params.push(min.clone());
                params.push(max.clone());
                format!("{column} BETWEEN ? AND ?")
            }
            Op::IsNull => format!("{column} IS NULL"),
            Op::IsNotNull => format!("{column} IS NOT NULL"),
            Op::IsEmpty => format!("({column} IS NULL OR {column} = '')"),
            Op::IsNotEmpty => format!("NOT ({column} IS NULL OR {column} = '')"),
            Op::HasAnyOf => {
                let items = as_json_array(value)?;
                if items.is_empty() {
                    // No value can satisfy membership in an empty required set.
                    return Ok("0 = 1".to_string());
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                params.extend(items);
                format!("EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value IN ({placeholders}))")
            }
            Op::HasAllOf => {
                let items = as_json_array(value)?;
                if items.is_empty() {
                    // Vacuously true: every element of an empty required set is present.
                    return Ok("1 = 1".to_string());
                }
                let mut clauses = Vec::with_capacity(items.len());
                for item in items {
                    params.push(item);
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value = ?)"
                    ));
                }
                format!("({})", clauses.join(" AND "))
            }
            Op::HasNoneOf => {
                let items = as_json_array(value)?;
                if items.is_empty() {
                    // Vacuously true: nothing is excluded by an empty exclusion set.
                    return Ok("1 = 1".to_string());
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                params.extend(items);
                format!("NOT EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value IN ({placeholders}))")
            }
        })
    }
}

fn as_str(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_json_array(value: &JsonValue) -> Result<Vec<JsonValue>, CacheError> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| CacheError::InvalidPredicate { message: "expected an array value".to_string() })
}
