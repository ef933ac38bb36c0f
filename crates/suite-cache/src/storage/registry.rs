//! The cache table registry: maps an upstream table id to its synthesized
//! storage table name and structure fingerprint.

use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use suite_cache_error::{CacheError, Result};

use crate::schema::ColumnSpec;

/// One row of `cache_table_registry`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub upstream_id: String,
    pub sql_table_name: String,
    pub fingerprint: String,
    pub created_at: i64,
    /// The synthesized column list, serialized, so the Query Engine can map
    /// field slugs to storage columns without re-deriving the schema from a
    /// Structure it is never handed.
    pub columns_json: String,
}

impl RegistryEntry {
    /// Deserialize [`Self::columns_json`] back into its column list.
    pub fn columns(&self) -> Result<Vec<ColumnSpec>> {
        serde_json::from_str(&self.columns_json).map_err(CacheError::Serialization)
    }
}

/// Look up the registry entry for an upstream table id, if it has ever been
/// populated.
pub async fn fetch(pool: &SqlitePool, upstream_id: &str) -> Result<Option<RegistryEntry>> {
    let row = sqlx::query("SELECT upstream_id, sql_table_name, fingerprint, created_at, columns_json FROM cache_table_registry WHERE upstream_id = ?")
        .bind(upstream_id)
        .fetch_optional(pool)
        .await
        .map_err(CacheError::Storage)?;
    Ok(row.map(|r| RegistryEntry {
        upstream_id: r.get("upstream_id"),
        sql_table_name: r.get("sql_table_name"),
        fingerprint: r.get("fingerprint"),
        created_at: r.get("created_at"),
        columns_json: r.get("columns_json"),
    }))
}

/// Upsert a registry entry.
pub async fn upsert(pool: &SqlitePool, entry: &RegistryEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO cache_table_registry (upstream_id, sql_table_name, fingerprint, created_at, columns_json) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(upstream_id) DO UPDATE SET sql_table_name = excluded.sql_table_name, fingerprint = excluded.fingerprint, created_at = excluded.created_at, columns_json = excluded.columns_json",
    )
    .bind(&entry.upstream_id)
    .bind(&entry.sql_table_name)
    .bind(&entry.fingerprint)
    .bind(entry.created_at)
    .bind(&entry.columns_json)
    .execute(pool)
    .await
    .map_err(CacheError::Storage)?;
    Ok(())
}

/// All registry entries belonging to tables registered under `solution_id`.
/// Table-to-solution ownership is read from `cached_tables`, which is how
/// invalidating a solution cascades to every table registered under it.
pub async fn table_ids_for_solution(pool: &SqlitePool, solution_id: &str) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT id FROM cached_tables WHERE solution_id = ?")
        .bind(solution_id)
        .fetch_all(pool)
        .await
        .map_err(CacheError::Storage)?;
    Ok(rows.iter().map(|r| r.get("id")).collect())
}

/// Every table id ever registered, used for the system-wide cascades.
pub async fn all_table_ids(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT upstream_id FROM cache_table_registry").fetch_all(pool).await.map_err(CacheError::Storage)?;
    Ok(rows.iter().map(|r| r.get("upstream_id")).collect())
}

/// Transactional variant of [`fetch`], for callers composing a cascade that
/// must observe and act on the registry within a single transaction.
pub async fn fetch_tx(tx: &mut Transaction<'_, Sqlite>, upstream_id: &str) -> Result<Option<RegistryEntry>> {
    let row = sqlx::query("SELECT upstream_id, sql_table_name, fingerprint, created_at, columns_json FROM cache_table_registry WHERE upstream_id = ?")
        .bind(upstream_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CacheError::Storage)?;
    Ok(row.map(|r| RegistryEntry {
        upstream_id: r.get("upstream_id"),
        sql_table_name: r.get("sql_table_name"),
        fingerprint: r.get("fingerprint"),
        created_at: r.get("created_at"),
        columns_json: r.get("columns_json"),
    }))
}

/// Transactional variant of [`table_ids_for_solution`].
pub async fn table_ids_for_solution_tx(tx: &mut Transaction<'_, Sqlite>, solution_id: &str) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT id FROM cached_tables WHERE solution_id = ?")
        .bind(solution_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(CacheError::Storage)?;
    Ok(rows.iter().map(|r| r.get("id")).collect())
}

/// Transactional variant of [`all_table_ids`].
pub async fn all_table_ids_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT upstream_id FROM cache_table_registry").fetch_all(&mut **tx).await.map_err(CacheError::Storage)?;
    Ok(rows.iter().map(|r| r.get("upstream_id")).collect())
}
