//! Cache Layer for an upstream-backed no-code/low-code database mediator.
//!
//! This crate is a durable, single-file relational store that materializes upstream
//! Solutions, Tables, Records, Members, and Teams, serves a structured query
//! language over them with TTL-based freshness and cascading invalidation,
//! and renders results densely via the Response Formatter.
//!
//! The dispatcher that owns the upstream HTTP connection, the JSON-RPC tool
//! registry, and prompt/installer surfaces are out of scope — this
//! crate only exposes the narrow invocation API in [`Cache`] that such a
//! dispatcher calls into. The cache never initiates upstream calls itself;
//! `populate_*` is the only ingress of fresh data.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod format;
mod perf;
pub mod query;
pub mod schema;
mod storage;
pub mod ttl;
pub mod types;
mod value;

use std::time::Duration;

use suite_cache_db::CachePool;
use suite_cache_error::Result;
use tracing::instrument;

pub use perf::PerformanceLedger;
pub use query::{Query, SortDirection};
pub use storage::StorageEngine;
pub use types::{Member, Record, Scope, Solution, StatusReport, Team, UpstreamTable};

use config::CacheConfig;
use schema::Structure;
use ttl::{TtlController, WarmSpec};

/// The cache core's public facade: the single entry point the out-of-scope
/// dispatcher calls into.
#[derive(Clone)]
pub struct Cache {
    storage: StorageEngine,
    ttl: TtlController,
    perf: std::sync::Arc<PerformanceLedger>,
    config: CacheConfig,
}

/// Scope keys for the fixed (non-per-table) caches' TTL config rows. Reuses
/// the same `cache_ttl_config` table as per-table TTLs.
const SOLUTIONS_TTL_KEY: &str = "__scope_solutions__";
const TABLE_LIST_TTL_KEY: &str = "__scope_table_list__";
const MEMBERS_TTL_KEY: &str = "__scope_members__";
const TEAMS_TTL_KEY: &str = "__scope_teams__";

impl Cache {
    /// Open the cache at `config.store_path`, or an in-memory store if unset.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        let pool = match &config.store_path {
            Some(path) => CachePool::open(path).await?,
            None => CachePool::open_in_memory().await?,
        };
        let storage = StorageEngine::open(pool).await?;
        let ttl = TtlController::new(storage.clone());
        let perf = std::sync::Arc::new(PerformanceLedger::new(config.flush_after_ops, config.flush_after));
        Ok(Self { storage, ttl, perf, config })
    }

    /// A disposable in-memory cache, for tests and short-lived invocations.
    pub async fn in_memory() -> Result<Self> {
        Self::open(CacheConfig::in_memory()).await
    }

    /// Populate (wholesale-replace) the records cache for one upstream
    /// table. `ttl` overrides the table's configured TTL for this call only.
    #[instrument(skip(self, structure, records), fields(table_id, count = records.len()))]
    pub async fn populate_table_records(&self, table_id: &str, structure: &Structure, records: &[Record], ttl: Option<Duration>) -> Result<usize> {
        let ttl_seconds = match ttl {
            Some(d) => duration_secs(d),
            None => self.ttl.get_ttl(table_id).await?,
        };
        self.storage.store_records(table_id, structure, records, ttl_seconds).await
    }

    /// Populate the global solutions cache.
    pub async fn populate_solutions(&self, solutions: &[Solution], ttl: Option<Duration>) -> Result<usize> {
        let ttl_seconds = self.resolve_scope_ttl(SOLUTIONS_TTL_KEY, ttl).await?;
        self.storage.store_solutions(solutions, ttl_seconds).await
    }

    /// Populate the table-list cache for a solution, or the global table
    /// list when `solution_id` is `None`.
    pub async fn populate_table_list(&self, solution_id: Option<&str>, tables: &[UpstreamTable], ttl: Option<Duration>) -> Result<usize> {
        let ttl_seconds = self.resolve_scope_ttl(TABLE_LIST_TTL_KEY, ttl).await?;
        self.storage.store_table_list(solution_id, tables, ttl_seconds).await
    }

    /// Populate the members cache.
    pub async fn populate_members(&self, members: &[Member], ttl: Option<Duration>) -> Result<usize> {
        let ttl_seconds = self.resolve_scope_ttl(MEMBERS_TTL_KEY, ttl).await?;
        self.storage.store_members(members, ttl_seconds).await
    }

    /// Populate the teams cache.
    pub async fn populate_teams(&self, teams: &[Team], ttl: Option<Duration>) -> Result<usize> {
        let ttl_seconds = self.resolve_scope_ttl(TEAMS_TTL_KEY, ttl).await?;
        self.storage.store_teams(teams, ttl_seconds).await
    }

    async fn resolve_scope_ttl(&self, scope_key: &str, ttl: Option<Duration>) -> Result<i64> {
        match ttl {
            Some(d) => Ok(duration_secs(d)),
            None => self.ttl.get_ttl(scope_key).await,
        }
    }

    /// Start a read-only query over `table_id`'s records cache. The caller composes predicate/ordering/pagination on the
    /// returned [`Query`] before calling `execute`/`count`.
    #[must_use]
    pub fn query(&self, table_id: impl Into<String>) -> Query {
        Query::new(table_id)
    }

    /// Execute `query`, returning matching rows as plain mappings`).
    pub async fn execute(&self, query: &Query) -> Result<Vec<Record>> {
        query.execute(&self.storage).await
    }

    /// Count matching rows for `query`, ignoring its pagination.
    pub async fn count(&self, query: &Query) -> Result<i64> {
        query.count(&self.storage).await
    }

    /// Invalidate a scope, cascading invariants 3–6.
    pub async fn invalidate(&self, scope: Scope, id: Option<&str>) -> Result<()> {
        self.ttl.invalidate(scope, id).await
    }

    /// `true` iff the scope has at least one non-expired row (spec
    /// invariant 5).
    pub async fn valid(&self, scope: Scope, id: Option<&str>) -> Result<bool> {
        self.ttl.valid(scope, id).await
    }

    /// Compose the status report shape from spec §6 across solutions, tables, and every cached table's records.
    pub async fn status(&self) -> Result<StatusReport> {
        self.ttl.status_report().await
    }

    /// Invalidate then report status — sugar `refresh`. Does
    /// not itself re-fetch from upstream.
    pub async fn refresh(&self, scope: Scope, table_id: Option<&str>, solution_id: Option<&str>) -> Result<StatusReport> {
        self.ttl.refresh(scope, table_id, solution_id).await
    }

    /// The configured TTL for a table, or the `default` preset.
    pub async fn get_ttl(&self, table_id: &str) -> Result<i64> {
        self.ttl.get_ttl(table_id).await
    }

    /// Persist a TTL override for a table. Never mutates row data.
    pub async fn set_ttl(&self, table_id: &str, seconds: i64, mutation_level: Option<&str>, notes: Option<&str>) -> Result<()> {
        self.ttl.set_ttl(table_id, seconds, mutation_level, notes).await
    }

    /// Record a cache hit, batched under the ledger's auto-flush policy.
    pub async fn record_hit(&self, table_id: &str) -> Result<()> {
        self.perf.record_hit(table_id, &self.storage).await
    }

    /// Record a cache miss, batched under the ledger's auto-flush policy.
    pub async fn record_miss(&self, table_id: &str) -> Result<()> {
        self.perf.record_miss(table_id, &self.storage).await
    }

    /// Force-flush the in-memory performance ledger into durable counters,
    /// bypassing the auto-flush thresholds. Useful at process shutdown.
    pub async fn flush_performance_counters(&self) -> Result<()> {
        self.perf.flush(&self.storage).await
    }

    /// Resolve a warm-pick spec into the table ids to pre-warm.
    pub async fn warm_selection(&self, spec: &WarmSpec, n: usize) -> Result<Vec<String>> {
        self.ttl.tables_to_warm(spec, n).await
    }

    /// This cache's configuration (store path, default TTL, timezone,
    /// flush thresholds).
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Render `records` as TOON, the dense pipe-delimited text format (spec
    /// §4.5), applying rich-document extraction and the configured timezone
    /// to any `datetime_slugs`.
    #[must_use]
    pub fn format_toon(&self, records: &[Record], fields: &[String], datetime_slugs: &[String], filtered_count: i64, total_count: i64) -> String {
        let ordered = format::field_order(fields);
        let rendered: Vec<Record> = records.iter().map(|r| format::apply_timezone(r, datetime_slugs, self.config.timezone)).collect();
        format::render_toon(&rendered, &ordered, filtered_count, total_count)
    }

    /// Render `records` as the JSON shape from applying the same
    /// rich-document extraction and timezone handling as [`Self::format_toon`].
    #[must_use]
    pub fn format_json(
        &self,
        records: &[Record],
        fields: &[String],
        datetime_slugs: &[String],
        total_count: i64,
        filtered_count: Option<i64>,
    ) -> serde_json::Value {
        let ordered = format::field_order(fields);
        let rendered: Vec<Record> = records.iter().map(|r| format::apply_timezone(r, datetime_slugs, self.config.timezone)).collect();
        format::render_json(&rendered, &ordered, total_count, filtered_count)
    }
}

fn duration_secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use schema::FieldDescriptor;

    fn structure() -> Structure {
        vec![
            FieldDescriptor { slug: "name".into(), label: "Name".into(), field_type: "textfield".into(), params: None },
            FieldDescriptor { slug: "status".into(), label: "Status".into(), field_type: "status".into(), params: None },
            FieldDescriptor { slug: "priority".into(), label: "Priority".into(), field_type: "number".into(), params: None },
        ]
    }

    fn record(id: &str, name: &str, status: &str, priority: i64) -> Record {
        json!({
            "id": id, "name": name,
            "status": {"value": status, "updated_on": "2026-01-01T00:00:00Z"},
            "priority": priority,
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[tokio::test]
    async fn populate_then_query_round_trips() {
        let cache = Cache::in_memory().await.unwrap();
        cache
            .populate_table_records(
                "tbl_A",
                &structure(),
                &[record("rec_1", "Task 1", "active", 1), record("rec_2", "Task 2", "pending", 3), record("rec_3", "Task 3", "active", 2)],
                None,
            )
            .await
            .unwrap();

        let predicate = json!({"status": "active"}).as_object().unwrap().clone();
        let query = cache.query("tbl_A").with_predicate(predicate).order_by("priority", SortDirection::Asc);
        let rows = cache.execute(&query).await.unwrap();

        let ids: Vec<&str> = rows.iter().filter_map(|r| r.get("id").and_then(serde_json::Value::as_str)).collect();
        assert_eq!(ids, vec!["rec_1", "rec_3"]);
    }

    #[tokio::test]
    async fn scenario_cascading_invalidation_from_solutions() {
        let cache = Cache::in_memory().await.unwrap();
        let tables = vec![
            UpstreamTable { id: "tbl_A".into(), name: "A".into(), solution_id: Some("sol_X".into()), structure: structure() },
            UpstreamTable { id: "tbl_B".into(), name: "B".into(), solution_id: Some("sol_X".into()), structure: structure() },
        ];
        cache.populate_solutions(&[Solution { id: "sol_X".into(), name: "Ops".into(), logo_icon: None, logo_color: None }], None).await.unwrap();
        cache.populate_table_list(Some("sol_X"), &tables, None).await.unwrap();
        cache.populate_table_records("tbl_A", &structure(), &[record("rec_1", "A", "active", 1)], None).await.unwrap();
        cache.populate_table_records("tbl_B", &structure(), &[record("rec_2", "B", "active", 1)], None).await.unwrap();

        cache.invalidate(Scope::Solutions, None).await.unwrap();

        assert!(!cache.valid(Scope::Solutions, None).await.unwrap());
        assert!(!cache.valid(Scope::TableList, Some("sol_X")).await.unwrap());
        assert!(!cache.valid(Scope::Records, Some("tbl_A")).await.unwrap());
        assert!(!cache.valid(Scope::Records, Some("tbl_B")).await.unwrap());
    }

    #[tokio::test]
    async fn explicit_ttl_override_is_honored_over_configured_default() {
        let cache = Cache::in_memory().await.unwrap();
        cache.set_ttl("tbl_A", 60, None, None).await.unwrap();
        cache
            .populate_table_records("tbl_A", &structure(), &[record("rec_1", "A", "active", 1)], Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        let rows = cache.execute(&cache.query("tbl_A")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(cache.valid(Scope::Records, Some("tbl_A")).await.unwrap());
    }

    #[tokio::test]
    async fn record_hit_and_miss_flush_into_durable_counters() {
        let cache = Cache::in_memory().await.unwrap();
        cache.record_hit("tbl_A").await.unwrap();
        cache.record_hit("tbl_A").await.unwrap();
        cache.record_miss("tbl_A").await.unwrap();
        cache.flush_performance_counters().await.unwrap();

        let counts = cache.storage.performance_counts("tbl_A").await.unwrap().unwrap();
        assert_eq!(counts, (2, 1));
    }

    #[tokio::test]
    async fn warm_selection_auto_ranks_by_hit_count() {
        let cache = Cache::in_memory().await.unwrap();
        cache.record_hit("tbl_hot").await.unwrap();
        cache.record_hit("tbl_hot").await.unwrap();
        cache.record_hit("tbl_cold").await.unwrap();
        cache.flush_performance_counters().await.unwrap();

        let picks = cache.warm_selection(&WarmSpec::Auto, 2).await.unwrap();
        assert_eq!(picks.first(), Some(&"tbl_hot".to_string()));
    }

    #[tokio::test]
    async fn format_toon_renders_header_and_rows() {
        let cache = Cache::in_memory().await.unwrap();
        cache.populate_table_records("tbl_A", &structure(), &[record("rec_1", "Task 1", "active", 1)], None).await.unwrap();
        let rows = cache.execute(&cache.query("tbl_A")).await.unwrap();
        let text = cache.format_toon(&rows, &["name".to_string()], &[], 1, 1);
        assert!(text.starts_with("1 of 1 filtered (1 total)\n"));
        assert!(text.contains("records[1]{id|title|name}:\n"));
    }
}
