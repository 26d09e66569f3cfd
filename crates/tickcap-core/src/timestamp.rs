//! Timestamp resolution with wall-clock fallback.
//!
//! Source-supplied timestamps are epoch milliseconds, but may be missing,
//! stringly-typed, or implausible. Resolution never fails: anything the
//! guard rejects falls back to the current wall clock.

use chrono::{Local, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::Value;

/// Canonical timestamp format, local time, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Values below this are not credible event times (2000-01-01 UTC in ms).
const EPOCH_GUARD_MS: i64 = 946_684_800_000;

/// Resolve a raw epoch-millisecond value into a canonical local timestamp.
///
/// Rejects values that fail to parse or fall before the year-2000 guard,
/// substituting the current wall clock. Never fails.
pub fn resolve_timestamp(raw: Option<&Value>) -> String {
    parse_epoch_ms(raw)
        .filter(|ms| *ms >= EPOCH_GUARD_MS)
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Local::now)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Extract the time-of-day from a resolved timestamp string.
pub fn time_of_day_of(dt_str: &str) -> Option<NaiveTime> {
    NaiveDateTime::parse_from_str(dt_str, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.time())
}

/// Unix-epoch seconds of a resolved timestamp string, interpreted as local time.
pub fn epoch_seconds_of(dt_str: &str) -> i64 {
    NaiveDateTime::parse_from_str(dt_str, TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

fn parse_epoch_ms(raw: Option<&Value>) -> Option<i64> {
    match raw {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}
