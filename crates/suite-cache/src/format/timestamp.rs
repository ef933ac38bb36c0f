//! Date/time stringification for the Response Formatter: outputs
//! date-only strings for bare dates, or `YYYY-MM-DD HH:MM:SS ±HHMM` for
//! timestamps, in the configured [`TimeZoneSetting`].

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::TimeZoneSetting;

/// Format a raw date/time value per `SMARTSUITE_TIMEZONE`. Values that parse
/// as a bare date (`YYYY-MM-DD`) are returned unchanged — there is no time
/// component to convert. Values that parse as an RFC 3339 timestamp are
/// converted into the configured zone and rendered as
/// `YYYY-MM-DD HH:MM:SS ±HHMM`. Anything else passes through unchanged
/// (best-effort: the formatter never fails on unparseable input).
#[must_use]
pub fn format_timestamp(raw: &str, tz: TimeZoneSetting) -> String {
    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return raw.to_string();
    }
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };
    let utc: DateTime<Utc> = parsed.with_timezone(&Utc);
    match tz {
        TimeZoneSetting::Utc => utc.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        TimeZoneSetting::Local => utc.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S %z").to_string(),
        TimeZoneSetting::Named(zone) => utc.with_timezone(&zone).format("%Y-%m-%d %H:%M:%S %z").to_string(),
        TimeZoneSetting::Offset(offset) => utc.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S %z").to_string(),
    }
}
