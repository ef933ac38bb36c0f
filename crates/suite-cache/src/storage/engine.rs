//! The Storage Engine: owns the single-file store and is its
//! only writer.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use suite_cache_db::{bind_param, json_to_param, CachePool};
use suite_cache_error::{CacheError, Result};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

use crate::schema::{self, CacheTableSchema, Structure};
use crate::types::{Member, Record, Scope, Solution, Team, UpstreamTable};
use crate::value::extract_column_value;

use super::registry::{self, RegistryEntry};

const BOOTSTRAP_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS cache_table_registry (
        upstream_id TEXT PRIMARY KEY,
        sql_table_name TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        columns_json TEXT NOT NULL DEFAULT '[]'
    )",
    "CREATE TABLE IF NOT EXISTS cache_ttl_config (
        upstream_id TEXT PRIMARY KEY,
        ttl_seconds INTEGER NOT NULL,
        mutation_level TEXT,
        notes TEXT,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cache_stats (
        scope TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (scope, key)
    )",
    "CREATE TABLE IF NOT EXISTS cache_performance (
        table_id TEXT PRIMARY KEY,
        hit_count INTEGER NOT NULL DEFAULT 0,
        miss_count INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cached_solutions (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        logo_icon TEXT,
        logo_color TEXT,
        cached_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cached_tables (
        id TEXT PRIMARY KEY,
        solution_id TEXT,
        name TEXT NOT NULL,
        structure_json TEXT NOT NULL,
        cached_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cached_members (
        id TEXT PRIMARY KEY,
        email TEXT,
        role TEXT,
        first_name TEXT,
        last_name TEXT,
        full_name TEXT,
        job_title TEXT,
        department TEXT,
        deleted_date TEXT,
        cached_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cached_teams (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        members_json TEXT NOT NULL,
        cached_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )",
];

/// Owns the single-file store. The only component allowed to write rows.
///
/// Spec §5 requires writes to be serialized through a process-wide exclusive
/// lock while reads proceed concurrently; `write_lock` is that lock. Every
/// write transaction, including the multi-statement invalidation cascade the
/// TTL Controller drives, is held while `write_lock` is held.
#[derive(Clone)]
pub struct StorageEngine {
    pool: CachePool,
    write_lock: Arc<Mutex<()>>,
}

/// A write transaction guarded by [`StorageEngine`]'s process-wide write
/// lock. Holding one guarantees no other write (including a concurrent
/// invalidation cascade) can interleave until [`WriteTransaction::commit`]
/// or drop.
pub struct WriteTransaction {
    _guard: OwnedMutexGuard<()>,
    tx: Transaction<'static, Sqlite>,
}

impl WriteTransaction {
    /// Commit the underlying transaction, releasing the write lock.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(CacheError::Storage)
    }

    /// Borrow the underlying transaction to run statements against it.
    pub fn as_tx(&mut self) -> &mut Transaction<'static, Sqlite> {
        &mut self.tx
    }
}

impl StorageEngine {
    /// Open (or create) the store and ensure metadata tables exist.
    pub async fn open(pool: CachePool) -> Result<Self> {
        for statement in BOOTSTRAP_SQL {
            sqlx::query(statement).execute(pool.pool()).await.map_err(CacheError::Storage)?;
        }
        Ok(Self { pool, write_lock: Arc::new(Mutex::new(())) })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        self.pool.pool()
    }

    /// Acquire the process-wide write lock and open a transaction against
    /// it. The lock is held until the returned [`WriteTransaction`] is
    /// committed or dropped, so callers that need several write statements
    /// to land atomically (e.g. a cascading invalidation) should drive them
    /// all through one `begin_write` rather than several separate calls.
    pub async fn begin_write(&self) -> Result<WriteTransaction> {
        let guard = self.write_lock.clone().lock_owned().await;
        let tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        Ok(WriteTransaction { _guard: guard, tx })
    }

    /// Transactionally create or replace the cache table for `table_id`.
    ///
    /// If the fingerprint of `structure` matches the existing registry
    /// entry, the table is kept untouched; otherwise it is dropped and
    /// recreated with the newly synthesized columns.
    #[instrument(skip(self, structure), fields(table_id))]
    pub async fn create_or_replace_cache_table(&self, table_id: &str, structure: &Structure) -> Result<CacheTableSchema> {
        let _guard = self.write_lock.lock().await;
        self.create_or_replace_cache_table_locked(table_id, structure).await
    }

    /// The body of [`Self::create_or_replace_cache_table`], assuming the
    /// caller already holds `write_lock`. Lets `store_records` fold schema
    /// creation into its own single lock acquisition instead of recursively
    /// locking (the lock is not reentrant).
    async fn create_or_replace_cache_table_locked(&self, table_id: &str, structure: &Structure) -> Result<CacheTableSchema> {
        let schema = schema::synthesize(table_id, structure)?;
        let existing = registry::fetch(self.pool(), table_id).await?;

        if let Some(existing) = &existing {
            if existing.fingerprint == schema.fingerprint {
                debug!(table_id, "cache table schema unchanged, keeping existing table");
                return Ok(schema);
            }
        }

        let mut tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        sqlx::query(&schema::drop_table_sql(&schema)).execute(&mut *tx).await.map_err(CacheError::Storage)?;
        sqlx::query(&schema::create_table_sql(&schema)).execute(&mut *tx).await.map_err(CacheError::Storage)?;
        for index_sql in schema::create_index_sql(&schema) {
            sqlx::query(&index_sql).execute(&mut *tx).await.map_err(CacheError::Storage)?;
        }
        let columns_json = serde_json::to_string(&schema.columns).map_err(CacheError::Serialization)?;
        let entry = RegistryEntry {
            upstream_id: table_id.to_string(),
            sql_table_name: schema.sql_table_name.clone(),
            fingerprint: schema.fingerprint.clone(),
            created_at: Utc::now().timestamp(),
            columns_json,
        };
        upsert_registry_tx(&mut tx, &entry).await?;
        tx.commit().await.map_err(CacheError::Storage)?;
        info!(table_id, sql_table_name = %schema.sql_table_name, "recreated cache table");
        Ok(schema)
    }

    /// Wholesale-replace the records for a table: delete existing rows and
    /// insert the new set, all in one transaction.
    #[instrument(skip(self, structure, records), fields(table_id, count = records.len()))]
    pub async fn store_records(
        &self,
        table_id: &str,
        structure: &Structure,
        records: &[Record],
        ttl_seconds: i64,
    ) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let schema = self.create_or_replace_cache_table_locked(table_id, structure).await?;
        let now = Utc::now().timestamp();
        let expires_at = now + ttl_seconds;

        let mut tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        sqlx::query(&format!("DELETE FROM {}", schema.sql_table_name)).execute(&mut *tx).await.map_err(CacheError::Storage)?;

        for record in records {
            let id = record.get("id").and_then(JsonValue::as_str).ok_or_else(|| CacheError::InvalidPredicate {
                message: "record is missing required 'id' field".to_string(),
            })?;

            let mut columns = vec!["id".to_string(), "cached_at".to_string(), "expires_at".to_string()];
            let mut params = vec![json_to_param(&JsonValue::String(id.to_string())), json_to_param(&JsonValue::from(now)), json_to_param(&JsonValue::from(expires_at))];

            for column in &schema.columns {
                let raw = record.get(&column.slug).cloned().unwrap_or(JsonValue::Null);
                if let Some(value) = extract_column_value(column.role, &raw) {
                    columns.push(column.name.clone());
                    params.push(json_to_param(&value));
                }
            }

            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!("INSERT INTO {} ({}) VALUES ({})", schema.sql_table_name, columns.join(", "), placeholders);
            let mut query = sqlx::query(&sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(&mut *tx).await.map_err(CacheError::Storage)?;
        }

        tx.commit().await.map_err(CacheError::Storage)?;
        Ok(records.len())
    }

    /// Replace the solutions table wholesale.
    pub async fn store_solutions(&self, solutions: &[Solution], ttl_seconds: i64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().timestamp();
        let expires_at = now + ttl_seconds;
        let mut tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        sqlx::query("DELETE FROM cached_solutions").execute(&mut *tx).await.map_err(CacheError::Storage)?;
        for solution in solutions {
            sqlx::query(
                "INSERT INTO cached_solutions (id, name, logo_icon, logo_color, cached_at, expires_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&solution.id)
            .bind(&solution.name)
            .bind(&solution.logo_icon)
            .bind(&solution.logo_color)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(CacheError::Storage)?;
        }
        tx.commit().await.map_err(CacheError::Storage)?;
        Ok(solutions.len())
    }

    /// Replace the table-list cache for a solution (or the global list when
    /// `solution_id` is `None`). `None` is cached as a distinct key per
    /// Open Questions.
    pub async fn store_table_list(&self, solution_id: Option<&str>, tables: &[UpstreamTable], ttl_seconds: i64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().timestamp();
        let expires_at = now + ttl_seconds;
        let mut tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        match solution_id {
            Some(sid) => {
                sqlx::query("DELETE FROM cached_tables WHERE solution_id = ?").bind(sid).execute(&mut *tx).await.map_err(CacheError::Storage)?;
            }
            None => {
                sqlx::query("DELETE FROM cached_tables").execute(&mut *tx).await.map_err(CacheError::Storage)?;
            }
        }
        for table in tables {
            let structure_json = serde_json::to_string(&table.structure).map_err(CacheError::Serialization)?;
            sqlx::query(
                "INSERT INTO cached_tables (id, solution_id, name, structure_json, cached_at, expires_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&table.id)
            .bind(&table.solution_id)
            .bind(&table.name)
            .bind(structure_json)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(CacheError::Storage)?;
        }
        tx.commit().await.map_err(CacheError::Storage)?;
        Ok(tables.len())
    }

    /// Replace the members cache wholesale.
    pub async fn store_members(&self, members: &[Member], ttl_seconds: i64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().timestamp();
        let expires_at = now + ttl_seconds;
        let mut tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        sqlx::query("DELETE FROM cached_members").execute(&mut *tx).await.map_err(CacheError::Storage)?;
        for member in members {
            sqlx::query(
                "INSERT INTO cached_members (id, email, role, first_name, last_name, full_name, job_title, department, deleted_date, cached_at, expires_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&member.id)
            .bind(&member.email)
            .bind(&member.role)
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(&member.full_name)
            .bind(&member.job_title)
            .bind(&member.department)
            .bind(&member.deleted_date)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(CacheError::Storage)?;
        }
        tx.commit().await.map_err(CacheError::Storage)?;
        Ok(members.len())
    }

    /// Replace the teams cache wholesale.
    pub async fn store_teams(&self, teams: &[Team], ttl_seconds: i64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().timestamp();
        let expires_at = now + ttl_seconds;
        let mut tx = self.pool().begin().await.map_err(CacheError::Storage)?;
        sqlx::query("DELETE FROM cached_teams").execute(&mut *tx).await.map_err(CacheError::Storage)?;
        for team in teams {
            let members_json = serde_json::to_string(&team.member_ids).map_err(CacheError::Serialization)?;
            sqlx::query("INSERT INTO cached_teams (id, name, description, members_json, cached_at, expires_at) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(&team.id)
                .bind(&team.name)
                .bind(&team.description)
                .bind(members_json)
                .bind(now)
                .bind(expires_at)
                .execute(&mut *tx)
                .await
                .map_err(CacheError::Storage)?;
        }
        tx.commit().await.map_err(CacheError::Storage)?;
        Ok(teams.len())
    }

    /// Row count of a scope, used by `status()`.
    pub async fn scope_row_count(&self, scope: Scope) -> Result<i64> {
        let table = fixed_table_name(scope);
        let row = sqlx::query(&format!("SELECT COUNT(*) as n FROM {table}")).fetch_one(self.pool()).await.map_err(CacheError::Storage)?;
        Ok(row.get("n"))
    }

    /// Merge a batch of hit/miss increments into the durable
    /// `cache_performance` counter for `table_id`.
    pub async fn merge_performance_counts(&self, table_id: &str, hits: u64, misses: u64) -> Result<()> {
        let hits = i64::try_from(hits).unwrap_or(i64::MAX);
        let misses = i64::try_from(misses).unwrap_or(i64::MAX);
        sqlx::query(
            "INSERT INTO cache_performance (table_id, hit_count, miss_count, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(table_id) DO UPDATE SET hit_count = hit_count + excluded.hit_count, miss_count = miss_count + excluded.miss_count, updated_at = excluded.updated_at",
        )
        .bind(table_id)
        .bind(hits)
        .bind(misses)
        .bind(Utc::now().timestamp())
        .execute(self.pool())
        .await
        .map_err(CacheError::Storage)?;
        Ok(())
    }

    /// The durable `(hit_count, miss_count)` for a table, if any counters
    /// have ever been flushed for it.
    pub async fn performance_counts(&self, table_id: &str) -> Result<Option<(i64, i64)>> {
        let row = sqlx::query("SELECT hit_count, miss_count FROM cache_performance WHERE table_id = ?")
            .bind(table_id)
            .fetch_optional(self.pool())
            .await
            .map_err(CacheError::Storage)?;
        Ok(row.map(|r| (r.get("hit_count"), r.get("miss_count"))))
    }
}

/// Delete every row from a fixed-shape scope table, as one statement within
/// an already-open write transaction (used by the TTL Controller's
/// cascading invalidation so the whole cascade commits atomically).
pub(crate) async fn clear_fixed_table_tx(tx: &mut Transaction<'_, Sqlite>, table_name: &str) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {table_name}")).execute(&mut **tx).await.map_err(CacheError::Storage)?;
    Ok(())
}

/// Delete every row from a dynamically created per-table cache table, by its
/// sanitized sql table name, within an already-open write transaction. A
/// no-op if the table was never created.
pub(crate) async fn clear_records_table_tx(tx: &mut Transaction<'_, Sqlite>, sql_table_name: &str) -> Result<()> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(sql_table_name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CacheError::Storage)?;
    if exists.is_some() {
        sqlx::query(&format!("DELETE FROM {sql_table_name}")).execute(&mut **tx).await.map_err(CacheError::Storage)?;
    }
    Ok(())
}

async fn upsert_registry_tx(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, entry: &RegistryEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO cache_table_registry (upstream_id, sql_table_name, fingerprint, created_at, columns_json) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(upstream_id) DO UPDATE SET sql_table_name = excluded.sql_table_name, fingerprint = excluded.fingerprint, created_at = excluded.created_at, columns_json = excluded.columns_json",
    )
    .bind(&entry.upstream_id)
    .bind(&entry.sql_table_name)
    .bind(&entry.fingerprint)
    .bind(entry.created_at)
    .bind(&entry.columns_json)
    .execute(&mut **tx)
    .await
    .map_err(CacheError::Storage)?;
    Ok(())
}

pub(crate) const fn fixed_table_name(scope: Scope) -> &'static str {
    match scope {
        Scope::Solutions => "cached_solutions",
        Scope::TableList => "cached_tables",
        Scope::Members => "cached_members",
        Scope::Teams => "cached_teams",
        Scope::Records => "",
    }
}
