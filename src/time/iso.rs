//! ISO-8601-like timestamps, with or without an explicit offset

use super::ParsedTime;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y%m%dT%H%M%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
];

/// Parse an ISO-8601-style string
///
/// A trailing `Z` or ` UTC` marks the value as UTC; a numeric offset is kept
/// as given. Anything else is returned as local time.
pub fn parse_iso(s: &str) -> Option<ParsedTime> {
    let s = s.trim();
    if s.len() < 10 || super::exif::is_placeholder(s) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(ParsedTime::Absolute(dt));
    }

    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(ParsedTime::Absolute(dt));
        }
    }

    let utc_body = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix(" UTC"))
        .map(str::trim_end);
    if let Some(body) = utc_body {
        return parse_naive(body).map(|dt| ParsedTime::Absolute(dt.and_utc().fixed_offset()));
    }

    parse_naive(s).map(ParsedTime::Local)
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
