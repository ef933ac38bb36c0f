//! Ambient configuration for the cache core: where the single-file store
//! lives, the default TTL, the timezone the Response Formatter stringifies
//! date/time values in, and the performance-counter flush thresholds.
//!
//! Credentials for the upstream are explicitly out of scope here and never appear on this type.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use chrono_tz::Tz;
use tracing::warn;

use crate::ttl::TtlPreset;

/// The timezone the Response Formatter uses when stringifying date/time
/// field values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeZoneSetting {
    Utc,
    /// The server's local timezone, resolved at format time via
    /// [`chrono::Local`]. `local` and `system` are treated identically.
    Local,
    Named(Tz),
    Offset(FixedOffset),
}

impl TimeZoneSetting {
    /// Parse `SMARTSUITE_TIMEZONE`. Unrecognized input falls back to UTC with
    /// a logged warning, since formatting is best-effort.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("utc") {
            return Self::Utc;
        }
        if trimmed.eq_ignore_ascii_case("local") || trimmed.eq_ignore_ascii_case("system") {
            return Self::Local;
        }
        if let Some(offset) = parse_numeric_offset(trimmed) {
            return Self::Offset(offset);
        }
        if let Ok(tz) = Tz::from_str(trimmed) {
            return Self::Named(tz);
        }
        warn!(value = trimmed, "unrecognized SMARTSUITE_TIMEZONE value, falling back to UTC");
        Self::Utc
    }

    /// Read from the environment, defaulting to UTC when unset.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("SMARTSUITE_TIMEZONE").map_or(Self::Utc, |raw| Self::parse(&raw))
    }
}

/// `+HHMM`, `+HH:MM`, or a bare `+HH` numeric offset.
fn parse_numeric_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, digits) = match raw.strip_prefix('+') {
        Some(rest) => (1, rest),
        None => raw.strip_prefix('-').map(|rest| (-1, rest))?,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        3 => (digits[..1].parse::<i32>().ok()?, digits[1..].parse::<i32>().ok()?),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    let total_seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(total_seconds)
}

/// Configuration for [`crate::Cache`], the cache core's public facade.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Where the single SQLite store file lives. Tests and short-lived
    /// invocations use [`Self::in_memory`] instead.
    pub store_path: Option<PathBuf>,
    /// The default TTL applied when a populate call and the TTL config both
    /// omit one.
    pub default_ttl: Duration,
    /// Timezone used by the Response Formatter for date/time stringification.
    pub timezone: TimeZoneSetting,
    /// Flush the performance-counter ledger once this many operations have
    /// accumulated since the last flush.
    pub flush_after_ops: u64,
    /// Flush the performance-counter ledger once this much time has elapsed
    /// since the last flush, regardless of operation count.
    pub flush_after: Duration,
}

impl CacheConfig {
    /// A config pointing at an on-disk store file, with every other field at
    /// its default.
    #[must_use]
    pub fn at_path(store_path: impl Into<PathBuf>) -> Self {
        Self { store_path: Some(store_path.into()), ..Self::default() }
    }

    /// A config for a disposable in-memory store (tests, short-lived CLI use).
    #[must_use]
    pub fn in_memory() -> Self {
        Self { store_path: None, ..Self::default() }
    }

    /// Build from the environment: `SMARTSUITE_TIMEZONE` for [`Self::timezone`];
    /// every other field keeps its default.
    #[must_use]
    pub fn from_env(store_path: impl Into<PathBuf>) -> Self {
        Self { timezone: TimeZoneSetting::from_env(), ..Self::at_path(store_path) }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            default_ttl: Duration::from_secs(u64::try_from(TtlPreset::Default.seconds()).unwrap_or(43_200)),
            timezone: TimeZoneSetting::Utc,
            flush_after_ops: 100,
            flush_after: Duration::from_secs(5 * 60),
        }
    }
}
