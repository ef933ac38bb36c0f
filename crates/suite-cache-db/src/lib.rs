//! Low-level storage adapter for the cache core: identifier sanitization,
//! the single-file SQLite pool, and `WhereClause` → SQL compilation.
//!
//! This crate knows nothing about upstream field types, TTL policy, or
//! record shapes — that domain logic lives in `suite-cache`, which builds
//! on this generic database abstraction.

mod identifier;
mod pool;
mod where_clause;

pub use identifier::{sanitize_and_dedup_column, sanitize_column_name, sanitize_table_name};
pub use pool::{bind_param, json_to_param, CachePool, SqlParam};
pub use where_clause::{WhereClause, WhereGenerator, WhereOperator};
