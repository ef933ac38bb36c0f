//! Owns the single-file SQLite store and the connection pool over it.

use std::path::Path;
use std::time::Duration;

use serde_json::Value as JsonValue;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use suite_cache_error::{CacheError, Result};

/// How long a connection waits on SQLite's own lock before giving up with
/// `SQLITE_BUSY`. A backstop under the Storage Engine's own write lock, for
/// any writer outside this process sharing the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A bound SQL parameter, converted from a [`JsonValue`] at bind time.
///
/// SQLite (via sqlx) needs a concrete Rust type per bind call; collection
/// values are JSON-serialized to text by the caller before reaching here,
/// so in practice only the scalar variants are produced, but this type still
/// covers parameters that are themselves arrays (`IN (...)`, `has_any_of`, …)
/// which bind element-wise.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Real(f64),
    Null,
}

/// Convert a [`JsonValue`] into the [`SqlParam`] sqlx will bind.
#[must_use]
pub fn json_to_param(value: &JsonValue) -> SqlParam {
    match value {
        JsonValue::Null => SqlParam::Null,
        JsonValue::Bool(b) => SqlParam::Int(i64::from(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlParam::Int(i)
            } else {
                SqlParam::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => SqlParam::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlParam::Text(value.to_string()),
    }
}

/// Bind a single [`SqlParam`] onto a query builder, returning it so binds
/// can be chained in a loop (`q = bind_param(q, p)`).
pub fn bind_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    param: SqlParam,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match param {
        SqlParam::Text(s) => query.bind(s),
        SqlParam::Int(i) => query.bind(i),
        SqlParam::Real(r) => query.bind(r),
        SqlParam::Null => query.bind(None::<String>),
    }
}

/// Owns the pool over the cache's single store file.
///
/// The Storage Engine is the only writer; this wrapper
/// exposes the raw pool so `suite-cache` can compose transactions, while
/// keeping file creation and permissioning in one place.
#[derive(Clone)]
pub struct CachePool {
    pool: SqlitePool,
}

impl CachePool {
    /// Open (creating if absent) the single-file store at `path`, with
    /// owner-only (0600) permissions.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true).busy_timeout(BUSY_TIMEOUT);
        // WAL mode lets reads proceed concurrently with a writer. The pool
        // itself does not serialize writers — `StorageEngine` holds a
        // `tokio::sync::Mutex` across each write transaction for that; the
        // busy timeout here is just a backstop against other processes (or
        // SQLite's own checkpointing) holding the file lock briefly.
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(CacheError::Storage)?;

        sqlx::query("PRAGMA journal_mode = WAL;").execute(&pool).await.map_err(CacheError::Storage)?;
        sqlx::query("PRAGMA foreign_keys = ON;").execute(&pool).await.map_err(CacheError::Storage)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                let _ = std::fs::set_permissions(path, perms);
            }
        }

        Ok(Self { pool })
    }

    /// Open an in-memory store, used by tests and by callers that want a
    /// disposable cache (e.g. a short-lived CLI invocation).
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:").create_if_missing(true).busy_timeout(BUSY_TIMEOUT);
        // A single shared in-memory connection: separate connections would
        // each see their own private `:memory:` database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .connect_with(options)
            .await
            .map_err(CacheError::Storage)?;
        Ok(Self { pool })
    }

    /// Access the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
