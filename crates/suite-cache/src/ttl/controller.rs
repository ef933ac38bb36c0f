//! The TTL & Invalidation Controller.

use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use suite_cache_error::{CacheError, Result};
use tracing::info;

use crate::storage::{clear_fixed_table_tx, clear_records_table_tx, fixed_table_name, registry, StorageEngine};
use crate::types::{Scope, StatusReport};

use super::preset::TtlPreset;

/// How to select which table ids to pre-warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmSpec {
    /// An explicit list of upstream table ids.
    Explicit(Vec<String>),
    /// A single upstream table id.
    Single(String),
    /// `"auto"` or absent: rank by historical `hit_count`.
    Auto,
}

/// Owns TTL configuration and expiration metadata; does not own row data.
#[derive(Clone)]
pub struct TtlController {
    storage: StorageEngine,
}

impl TtlController {
    #[must_use]
    pub const fn new(storage: StorageEngine) -> Self {
        Self { storage }
    }

    /// The configured TTL for a table, or the `default` preset.
    pub async fn get_ttl(&self, table_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT ttl_seconds FROM cache_ttl_config WHERE upstream_id = ?")
            .bind(table_id)
            .fetch_optional(self.storage.pool())
            .await
            .map_err(CacheError::Storage)?;
        Ok(row.map_or(TtlPreset::Default.seconds(), |r| r.get("ttl_seconds")))
    }

    /// Persist a TTL override. Never touches record rows.
    pub async fn set_ttl(&self, table_id: &str, seconds: i64, mutation_level: Option<&str>, notes: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO cache_ttl_config (upstream_id, ttl_seconds, mutation_level, notes, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(upstream_id) DO UPDATE SET ttl_seconds = excluded.ttl_seconds, mutation_level = excluded.mutation_level, notes = excluded.notes, updated_at = excluded.updated_at",
        )
        .bind(table_id)
        .bind(seconds)
        .bind(mutation_level)
        .bind(notes)
        .bind(Utc::now().timestamp())
        .execute(self.storage.pool())
        .await
        .map_err(CacheError::Storage)?;
        Ok(())
    }

    /// `true` iff the scope has at least one non-expired row.
    pub async fn valid(&self, scope: Scope, id: Option<&str>) -> Result<bool> {
        let now = Utc::now().timestamp();
        let count: i64 = match scope {
            Scope::Records => {
                let Some(table_id) = id else {
                    return Err(CacheError::InvalidPredicate { message: "records scope requires a table id".to_string() });
                };
                let Some(entry) = registry::fetch(self.storage.pool(), table_id).await? else {
                    return Ok(false);
                };
                let row = sqlx::query(&format!("SELECT COUNT(*) as n FROM {} WHERE expires_at > ?", entry.sql_table_name))
                    .bind(now)
                    .fetch_one(self.storage.pool())
                    .await
                    .map_err(CacheError::Storage)?;
                row.get("n")
            }
            Scope::TableList => {
                let sql = match id {
                    Some(sid) => {
                        let row = sqlx::query("SELECT COUNT(*) as n FROM cached_tables WHERE solution_id = ? AND expires_at > ?")
                            .bind(sid)
                            .bind(now)
                            .fetch_one(self.storage.pool())
                            .await
                            .map_err(CacheError::Storage)?;
                        return Ok(row.get::<i64, _>("n") > 0);
                    }
                    None => "SELECT COUNT(*) as n FROM cached_tables WHERE expires_at > ?",
                };
                let row = sqlx::query(sql).bind(now).fetch_one(self.storage.pool()).await.map_err(CacheError::Storage)?;
                row.get("n")
            }
            Scope::Solutions | Scope::Members | Scope::Teams => {
                let table = fixed_table_name(scope);
                let row = sqlx::query(&format!("SELECT COUNT(*) as n FROM {table} WHERE expires_at > ?"))
                    .bind(now)
                    .fetch_one(self.storage.pool())
                    .await
                    .map_err(CacheError::Storage)?;
                row.get("n")
            }
        };
        Ok(count > 0)
    }

    /// Cascading invalidation. The whole cascade — clearing the scope's own
    /// rows plus every scope it fans out to (spec §4.4) — runs inside one
    /// write transaction under the Storage Engine's write lock, so a reader
    /// never observes a partially-invalidated cascade.
    pub async fn invalidate(&self, scope: Scope, id: Option<&str>) -> Result<()> {
        let mut wtx = self.storage.begin_write().await?;
        match scope {
            Scope::Records => {
                let table_id = id.ok_or_else(|| CacheError::InvalidPredicate { message: "records invalidation requires a table id".to_string() })?;
                invalidate_records_tx(wtx.as_tx(), table_id).await?;
            }
            Scope::TableList => match id {
                Some(solution_id) => {
                    invalidate_table_list_for_solution_tx(wtx.as_tx(), solution_id).await?;
                }
                None => {
                    invalidate_all_table_lists_and_records_tx(wtx.as_tx()).await?;
                }
            },
            Scope::Solutions => {
                clear_fixed_table_tx(wtx.as_tx(), fixed_table_name(Scope::Solutions)).await?;
                invalidate_all_table_lists_and_records_tx(wtx.as_tx()).await?;
            }
            Scope::Members | Scope::Teams => {
                clear_fixed_table_tx(wtx.as_tx(), fixed_table_name(scope)).await?;
            }
        }
        wtx.commit().await?;
        info!(scope = scope.as_str(), id, "invalidated cache scope");
        Ok(())
    }

    /// Sugar for `invalidate` followed by a status report. Does
    /// not itself re-fetch from upstream.
    pub async fn refresh(&self, scope: Scope, table_id: Option<&str>, solution_id: Option<&str>) -> Result<StatusReport> {
        match scope {
            Scope::Records => {
                let table_id = table_id.ok_or_else(|| CacheError::InvalidPredicate { message: "refreshing records requires a table id".to_string() })?;
                self.invalidate(Scope::Records, Some(table_id)).await?;
            }
            Scope::TableList => {
                self.invalidate(Scope::TableList, solution_id).await?;
            }
            other => {
                self.invalidate(other, None).await?;
            }
        }
        self.status_report().await
    }

    /// Compose the status report shape from spec §6.
    pub async fn status_report(&self) -> Result<StatusReport> {
        use crate::types::{RecordsScopeStatus, ScopeStatus};

        let solutions_count = self.storage.scope_row_count(Scope::Solutions).await?;
        let tables_count = self.storage.scope_row_count(Scope::TableList).await?;
        let solutions_valid = self.valid(Scope::Solutions, None).await?;
        let tables_valid = self.valid(Scope::TableList, None).await?;

        let mut records = Vec::new();
        for table_id in registry::all_table_ids(self.storage.pool()).await? {
            let Some(entry) = registry::fetch(self.storage.pool(), &table_id).await? else { continue };
            let row = sqlx::query(&format!("SELECT COUNT(*) as n, MAX(expires_at) as max_exp FROM {}", entry.sql_table_name))
                .fetch_one(self.storage.pool())
                .await
                .map_err(CacheError::Storage)?;
            let count: i64 = row.get("n");
            let max_exp: Option<i64> = row.get("max_exp");
            let is_valid = self.valid(Scope::Records, Some(&table_id)).await?;
            records.push(RecordsScopeStatus {
                table_id,
                count,
                is_valid,
                expires_at: max_exp.map(|e| e.to_string()),
            });
        }

        Ok(StatusReport {
            timestamp: Utc::now().to_rfc3339(),
            solutions: ScopeStatus { count: solutions_count, is_valid: solutions_valid, expires_at: None },
            tables: ScopeStatus { count: tables_count, is_valid: tables_valid, expires_at: None },
            records,
        })
    }

    /// `tables_to_warm`: resolve a [`WarmSpec`] into the list of
    /// table ids the dispatcher should pre-warm.
    pub async fn tables_to_warm(&self, spec: &WarmSpec, n: usize) -> Result<Vec<String>> {
        match spec {
            WarmSpec::Explicit(ids) => Ok(ids.clone()),
            WarmSpec::Single(id) => Ok(vec![id.clone()]),
            WarmSpec::Auto => {
                let rows = sqlx::query("SELECT table_id FROM cache_performance ORDER BY hit_count DESC LIMIT ?")
                    .bind(i64::try_from(n).unwrap_or(i64::MAX))
                    .fetch_all(self.storage.pool())
                    .await
                    .map_err(CacheError::Storage)?;
                Ok(rows.iter().map(|r| r.get("table_id")).collect())
            }
        }
    }
}

/// Clear the records cache for `table_id`, within an already-open write
/// transaction. A no-op if the table was never populated.
async fn invalidate_records_tx(tx: &mut Transaction<'_, Sqlite>, table_id: &str) -> Result<()> {
    if let Some(entry) = registry::fetch_tx(tx, table_id).await? {
        clear_records_table_tx(tx, &entry.sql_table_name).await?;
    }
    Ok(())
}

/// Clear one solution's table-list rows and the records caches of every
/// table registered under it, within an already-open write transaction.
async fn invalidate_table_list_for_solution_tx(tx: &mut Transaction<'_, Sqlite>, solution_id: &str) -> Result<()> {
    let table_ids = registry::table_ids_for_solution_tx(tx, solution_id).await?;
    sqlx::query("DELETE FROM cached_tables WHERE solution_id = ?").bind(solution_id).execute(&mut **tx).await.map_err(CacheError::Storage)?;
    for table_id in table_ids {
        invalidate_records_tx(tx, &table_id).await?;
    }
    Ok(())
}

/// Clear every table-list row and every table's records cache, within an
/// already-open write transaction.
async fn invalidate_all_table_lists_and_records_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    let table_ids = registry::all_table_ids_tx(tx).await?;
    sqlx::query("DELETE FROM cached_tables").execute(&mut **tx).await.map_err(CacheError::Storage)?;
    for table_id in table_ids {
        invalidate_records_tx(tx, &table_id).await?;
    }
    Ok(())
}
