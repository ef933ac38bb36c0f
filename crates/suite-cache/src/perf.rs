//! Performance counters: a process-wide hit/miss ledger that is
//! cheap to update from any reader and is periodically flushed into the
//! durable `cache_performance` table.
//!
//! Atomic counters carry the hot path, and a `parking_lot::RwLock`-guarded
//! map holds the per-table breakdown, with `Relaxed` ordering since
//! increments are not required to be ordered across tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use suite_cache_error::Result;
use tracing::debug;

use crate::storage::StorageEngine;

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    hits: u64,
    misses: u64,
}

/// The in-memory ledger co-owned by every reader that reports a hit or miss;
/// only [`PerformanceLedger::flush`] — invoked through
/// the Storage Engine — durably persists it.
pub struct PerformanceLedger {
    counters: RwLock<HashMap<String, Counts>>,
    ops_since_flush: AtomicU64,
    last_flush: RwLock<Instant>,
    flush_after_ops: u64,
    flush_after: Duration,
}

impl PerformanceLedger {
    #[must_use]
    pub fn new(flush_after_ops: u64, flush_after: Duration) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            ops_since_flush: AtomicU64::new(0),
            last_flush: RwLock::new(Instant::now()),
            flush_after_ops,
            flush_after,
        }
    }

    /// Record a cache hit for `table_id`. If the auto-flush policy has
    /// tripped (≥ 100 ops since the last flush, or ≥ 5 minutes elapsed),
    /// this call also flushes the ledger.
    pub async fn record_hit(&self, table_id: &str, storage: &StorageEngine) -> Result<()> {
        self.bump(table_id, true);
        self.maybe_flush(storage).await
    }

    /// Record a cache miss for `table_id`.
    pub async fn record_miss(&self, table_id: &str, storage: &StorageEngine) -> Result<()> {
        self.bump(table_id, false);
        self.maybe_flush(storage).await
    }

    fn bump(&self, table_id: &str, is_hit: bool) {
        let mut counters = self.counters.write();
        let entry = counters.entry(table_id.to_string()).or_default();
        if is_hit {
            entry.hits += 1;
        } else {
            entry.misses += 1;
        }
        drop(counters);
        self.ops_since_flush.fetch_add(1, Ordering::Relaxed);
    }

    fn should_flush(&self) -> bool {
        let ops = self.ops_since_flush.load(Ordering::Relaxed);
        if ops >= self.flush_after_ops {
            return true;
        }
        self.last_flush.read().elapsed() >= self.flush_after
    }

    async fn maybe_flush(&self, storage: &StorageEngine) -> Result<()> {
        if self.should_flush() {
            self.flush(storage).await?;
        }
        Ok(())
    }

    /// Merge the in-memory ledger into `cache_performance` and reset it.
    /// Idempotent when the ledger is empty.
    pub async fn flush(&self, storage: &StorageEngine) -> Result<()> {
        let drained: Vec<(String, Counts)> = {
            let mut counters = self.counters.write();
            counters.drain().collect()
        };
        self.ops_since_flush.store(0, Ordering::Relaxed);
        *self.last_flush.write() = Instant::now();

        if drained.is_empty() {
            return Ok(());
        }
        debug!(tables = drained.len(), "flushing performance counter ledger");
        for (table_id, counts) in drained {
            storage.merge_performance_counts(&table_id, counts.hits, counts.misses).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use suite_cache_db::CachePool;

    use super::*;

    async fn engine() -> StorageEngine {
        let pool = CachePool::open_in_memory().await.unwrap();
        StorageEngine::open(pool).await.unwrap()
    }

    #[tokio::test]
    async fn flush_is_idempotent_when_empty() {
        let storage = engine().await;
        let ledger = PerformanceLedger::new(100, Duration::from_secs(300));
        ledger.flush(&storage).await.unwrap();
        ledger.flush(&storage).await.unwrap();
    }

    #[tokio::test]
    async fn flush_merges_hits_and_misses_into_storage() {
        let storage = engine().await;
        let ledger = PerformanceLedger::new(100, Duration::from_secs(300));
        ledger.record_hit("tbl_A", &storage).await.unwrap();
        ledger.record_hit("tbl_A", &storage).await.unwrap();
        ledger.record_miss("tbl_A", &storage).await.unwrap();
        ledger.flush(&storage).await.unwrap();

        let (hits, misses) = storage.performance_counts("tbl_A").await.unwrap().unwrap();
        assert_eq!(hits, 2);
        assert_eq!(misses, 1);
    }

    #[tokio::test]
    async fn auto_flush_triggers_at_ops_threshold() {
        let storage = engine().await;
        let ledger = PerformanceLedger::new(3, Duration::from_secs(300));
        ledger.record_hit("tbl_A", &storage).await.unwrap();
        ledger.record_hit("tbl_A", &storage).await.unwrap();
        ledger.record_hit("tbl_A", &storage).await.unwrap();

        // third op crosses the threshold and flushes synchronously
        let (hits, _misses) = storage.performance_counts("tbl_A").await.unwrap().unwrap();
        assert_eq!(hits, 3);
    }

    #[tokio::test]
    async fn repeated_flush_accumulates_rather_than_overwrites() {
        let storage = engine().await;
        let ledger = PerformanceLedger::new(100, Duration::from_secs(300));
        ledger.record_hit("tbl_A", &storage).await.unwrap();
        ledger.flush(&storage).await.unwrap();
        ledger.record_hit("tbl_A", &storage).await.unwrap();
        ledger.flush(&storage).await.unwrap();

        let (hits, _misses) = storage.performance_counts("tbl_A").await.unwrap().unwrap();
        assert_eq!(hits, 2);
    }
}
