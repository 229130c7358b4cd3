//! Unix epoch values in seconds or milliseconds

use chrono::{DateTime, Datelike, Utc};

/// Values below this are seconds, values at or above are milliseconds.
/// 10^12 ms is 2001-09-09; 10^12 s would be far past any plausible date.
pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Smaller values are more likely a bare year or counter than a timestamp (1973-03-03)
const MIN_EPOCH_SECONDS: i64 = 100_000_000;

/// Interpret an integer as a Unix timestamp, disambiguating the unit by magnitude
pub fn parse_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value < MIN_EPOCH_SECONDS {
        return None;
    }

    let dt = if value < MILLIS_THRESHOLD {
        DateTime::from_timestamp(value, 0)?
    } else {
        DateTime::from_timestamp_millis(value)?
    };

    (1900..=2100).contains(&dt.year()).then_some(dt)
}
