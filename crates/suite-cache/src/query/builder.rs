//! The Query Engine: translates a predicate tree into
//! parameterized SQL and executes it over one cache table. Read-only: the
//! Storage Engine remains the sole writer.

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use sqlx::{Column, Row};
use suite_cache_db::{bind_param, json_to_param, WhereGenerator};
use suite_cache_error::{CacheError, Result};

use crate::storage::{registry, StorageEngine};
use crate::types::Record;

use super::predicate::parse_predicate;

/// Sort direction, case-normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Case-insensitive parse; anything other than `desc` is ascending.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// An immutable query builder: `(table_id, predicate, ordering?, limit?,
/// offset?)`.
#[derive(Debug, Clone)]
pub struct Query {
    table_id: String,
    predicate: Map<String, JsonValue>,
    ordering: Option<(String, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Query {
    #[must_use]
    pub fn new(table_id: impl Into<String>) -> Self {
        Self { table_id: table_id.into(), predicate: Map::new(), ordering: None, limit: None, offset: None }
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Map<String, JsonValue>) -> Self {
        self.predicate = predicate;
        self
    }

    #[must_use]
    pub fn order_by(mut self, field_slug: impl Into<String>, direction: SortDirection) -> Self {
        self.ordering = Some((field_slug.into(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Execute the query, returning matching rows as plain mappings.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CacheMiss`] if `table_id` has never been
    /// populated, and [`CacheError::InvalidPredicate`] for a malformed or
    /// unrecognized operator.
    pub async fn execute(&self, storage: &StorageEngine) -> Result<Vec<Record>> {
        let (entry, where_sql, params) = self.compile(storage).await?;

        let mut sql = format!("SELECT * FROM {} WHERE ({}) AND expires_at > ?", entry.sql_table_name, where_sql);
        if let Some((slug, direction)) = &self.ordering {
            let columns = entry.columns()?;
            if let Some(column) = columns.iter().find(|c| &c.slug == slug) {
                sql.push_str(&format!(" ORDER BY {} {}", column.name, direction.sql_keyword()));
            }
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_param(query, json_to_param(param));
        }
        query = query.bind(Utc::now().timestamp());

        let rows = query.fetch_all(storage.pool()).await.map_err(CacheError::Storage)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    /// Count matching rows; ignores `limit`/`offset`.
    pub async fn count(&self, storage: &StorageEngine) -> Result<i64> {
        let (entry, where_sql, params) = self.compile(storage).await?;
        let sql = format!("SELECT COUNT(*) as n FROM {} WHERE ({}) AND expires_at > ?", entry.sql_table_name, where_sql);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_param(query, json_to_param(param));
        }
        query = query.bind(Utc::now().timestamp());

        let row = query.fetch_one(storage.pool()).await.map_err(CacheError::Storage)?;
        Ok(row.get("n"))
    }

    async fn compile(&self, storage: &StorageEngine) -> Result<(registry::RegistryEntry, String, Vec<JsonValue>)> {
        let entry = registry::fetch(storage.pool(), &self.table_id)
            .await?
            .ok_or_else(|| CacheError::CacheMiss { table_id: self.table_id.clone() })?;
        let columns = entry.columns()?;
        let clause = parse_predicate(&self.predicate, &columns)?;
        let (where_sql, params) = WhereGenerator::new().generate(&clause)?;
        Ok((entry, where_sql, params))
    }
}

/// Convert one result row into a plain mapping, guessing the SQLite storage
/// class per column (text columns that hold JSON-serialized collections or
/// composite rich documents decode back into structured values).
fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Record {
    let mut map = Record::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let value = if let Ok(v) = row.try_get::<i64, _>(name.as_str()) {
            JsonValue::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(name.as_str()) {
            JsonValue::from(v)
        } else if let Ok(v) = row.try_get::<String, _>(name.as_str()) {
            serde_json::from_str::<JsonValue>(&v).unwrap_or(JsonValue::String(v))
        } else {
            JsonValue::Null
        };
        map.insert(name, value);
    }
    map
}

#[cfg(test)]
mod tests {
    use suite_cache_db::CachePool;

    use super::*;
    use crate::schema::FieldDescriptor;
    use crate::storage::StorageEngine;

    fn structure() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor { slug: "name".into(), label: "Name".into(), field_type: "textfield".into(), params: None },
            FieldDescriptor { slug: "status".into(), label: "Status".into(), field_type: "status".into(), params: None },
            FieldDescriptor { slug: "priority".into(), label: "Priority".into(), field_type: "number".into(), params: None },
        ]
    }

    fn record(id: &str, name: &str, priority: i64) -> Record {
        serde_json::json!({"id": id, "name": name, "priority": priority}).as_object().unwrap().clone()
    }

    async fn engine() -> StorageEngine {
        let pool = CachePool::open_in_memory().await.unwrap();
        StorageEngine::open(pool).await.unwrap()
    }

    #[tokio::test]
    async fn query_without_predicate_returns_all_rows() {
        let engine = engine().await;
        engine.store_records("tbl_A", &structure(), &[record("rec_1", "A", 1), record("rec_2", "B", 2)], 3600).await.unwrap();

        let rows = Query::new("tbl_A").execute(&engine).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn query_with_predicate_filters_rows() {
        let engine = engine().await;
        engine.store_records("tbl_A", &structure(), &[record("rec_1", "A", 1), record("rec_2", "B", 2)], 3600).await.unwrap();

        let predicate = serde_json::json!({"priority": {"gte": 2}}).as_object().unwrap().clone();
        let rows = Query::new("tbl_A").with_predicate(predicate).execute(&engine).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id").and_then(JsonValue::as_str), Some("rec_2"));
    }

    #[tokio::test]
    async fn query_tolerates_unknown_field_slug() {
        let engine = engine().await;
        engine.store_records("tbl_A", &structure(), &[record("rec_1", "A", 1)], 3600).await.unwrap();

        let predicate = serde_json::json!({"ghost_field": "whatever"}).as_object().unwrap().clone();
        let rows = Query::new("tbl_A").with_predicate(predicate).execute(&engine).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn query_against_uncached_table_is_a_miss() {
        let engine = engine().await;
        let err = Query::new("tbl_ghost").execute(&engine).await.unwrap_err();
        assert!(matches!(err, CacheError::CacheMiss { .. }));
    }

    #[tokio::test]
    async fn count_ignores_limit_and_offset() {
        let engine = engine().await;
        engine.store_records("tbl_A", &structure(), &[record("rec_1", "A", 1), record("rec_2", "B", 2)], 3600).await.unwrap();

        let count = Query::new("tbl_A").limit(1).offset(1).count(&engine).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn ordering_respects_direction() {
        let engine = engine().await;
        engine.store_records("tbl_A", &structure(), &[record("rec_1", "A", 2), record("rec_2", "B", 1)], 3600).await.unwrap();

        let rows = Query::new("tbl_A").order_by("priority", SortDirection::Asc).execute(&engine).await.unwrap();
        assert_eq!(rows[0].get("id").and_then(JsonValue::as_str), Some("rec_2"));
    }
}
