//! EXIF-style `YYYY:MM:DD HH:MM:SS` timestamps, plain or with a meridiem glyph

use super::ParsedTime;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// Meridiem glyphs some phone firmwares append to the EXIF time
const GLYPH_AM: &str = "上午";
const GLYPH_PM: &str = "下午";

static MERIDIEM_PATTERN: OnceLock<Regex> = OnceLock::new();

fn meridiem_pattern() -> &'static Regex {
    MERIDIEM_PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}):(\d{2}):(\d{2})\s+(\d{1,2}):(\d{2}):(\d{2})\s*(上午|下午)$").unwrap()
    })
}

/// All-zero dates like `0000:00:00 00:00:00` are camera placeholders
pub(crate) fn is_placeholder(s: &str) -> bool {
    s.bytes().filter(u8::is_ascii_digit).all(|b| b == b'0')
}

fn clean(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\0' || c == '"')
}

/// Parse `YYYY:MM:DD HH:MM:SS[.fff][±hh:mm]`
pub fn parse_delimited(s: &str) -> Option<ParsedTime> {
    let s = clean(s);
    if s.len() < 19 || is_placeholder(s) {
        return None;
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S%.f") {
        return Some(ParsedTime::Local(dt));
    }

    if let Some(naive) = s.strip_suffix('Z')
        && let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y:%m:%d %H:%M:%S%.f")
    {
        return Some(ParsedTime::Absolute(dt.and_utc().fixed_offset()));
    }

    DateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S%.f%z")
        .ok()
        .map(ParsedTime::Absolute)
}

/// Parse `YYYY:MM:DD HH:MM:SS` followed by the AM/PM glyph
///
/// Hours up to 12 follow the 12-hour clock (12 AM is midnight, 12 PM is
/// noon). Firmwares that write a 24-hour value next to the PM glyph
/// (`21:23:28下午`) keep the hour as written.
pub fn parse_meridiem(s: &str) -> Option<NaiveDateTime> {
    let s = clean(s);
    if !(s.ends_with(GLYPH_AM) || s.ends_with(GLYPH_PM)) || is_placeholder(s) {
        return None;
    }

    let caps = meridiem_pattern().captures(s)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    let hour: u32 = caps.get(4)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(5)?.as_str().parse().ok()?;
    let second: u32 = caps.get(6)?.as_str().parse().ok()?;

    let hour = match caps.get(7)?.as_str() {
        GLYPH_AM if hour == 12 => 0,
        GLYPH_PM if hour < 12 => hour + 12,
        _ => hour,
    };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}
