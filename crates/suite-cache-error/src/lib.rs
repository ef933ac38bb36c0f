//! Unified error type for the cache core.
//!
//! All cache operations return [`Result<T>`] wrapping [`CacheError`]. The
//! dispatcher that owns the upstream connection is the only caller; this
//! crate knows nothing about HTTP, JSON-RPC, or the upstream transport.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias used throughout the cache core.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the cache core.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A query targeted a table that has never been populated.
    #[error("cache miss for table '{table_id}'")]
    CacheMiss { table_id: String },

    /// A scope exists but every row has expired.
    #[error("cache expired for {scope} '{id}'")]
    CacheExpired { scope: String, id: String },

    /// A predicate referenced an unsupported operator or malformed op-map.
    #[error("invalid predicate: {message}")]
    InvalidPredicate { message: String },

    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Sanitizing an identifier produced an empty or unsafe result.
    #[error("could not derive a safe identifier from '{input}'")]
    Identifier { input: String },

    /// A record value could not be serialized/deserialized to JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CacheMiss { .. } => "cache_miss",
            Self::CacheExpired { .. } => "cache_expired",
            Self::InvalidPredicate { .. } => "invalid_predicate",
            Self::Storage(_) => "storage_error",
            Self::Identifier { .. } => "identifier_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// Whether a caller should treat this the same as a cache miss (i.e.
    /// re-fetch from upstream and retry once).
    #[must_use]
    pub const fn is_miss_like(&self) -> bool {
        matches!(self, Self::CacheMiss { .. } | Self::CacheExpired { .. })
    }
}
