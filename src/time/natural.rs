//! Best-effort lexical parse of loosely structured date strings
//!
//! Handles month names, ordinals, weekday prefixes, slashed and dotted
//! numeric dates and compact digit runs. Results outside 1900..=2100 are
//! discarded since bare digit runs match too eagerly otherwise.

use super::ParsedTime;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

const DATETIME_FORMATS: &[&str] = &[
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%B %d %Y %I:%M:%S %p",
    "%B %d %Y %I:%M %p",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%d %B %Y %I:%M:%S %p",
    "%d %B %Y %I:%M %p",
    "%Y %B %d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y%m%d%H%M%S",
    "%Y%m%d %H%M%S",
];

const DATE_FORMATS: &[&str] = &[
    "%B %d %Y",
    "%d %B %Y",
    "%Y %B %d",
    "%B %Y %d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%Y%m%d",
];

static ORDINAL: OnceLock<Regex> = OnceLock::new();
static WEEKDAY: OnceLock<Regex> = OnceLock::new();
static FILLER: OnceLock<Regex> = OnceLock::new();

fn ordinal() -> &'static Regex {
    ORDINAL.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap())
}

fn weekday() -> &'static Regex {
    WEEKDAY.get_or_init(|| {
        Regex::new(r"(?i)\b(mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)(day|nesday|sday|urday)?\b\.?").unwrap()
    })
}

fn filler() -> &'static Regex {
    FILLER.get_or_init(|| Regex::new(r"(?i)\b(at|of|the)\b").unwrap())
}

/// Strip punctuation and filler words so the format table stays small
fn tidy(s: &str) -> String {
    let s = s.replace(',', " ");
    let s = ordinal().replace_all(&s, "$1");
    let s = weekday().replace_all(&s, " ");
    let s = filler().replace_all(&s, " ");
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn plausible(dt: &NaiveDateTime) -> bool {
    (1900..=2100).contains(&dt.year())
}

pub fn parse_natural(s: &str) -> Option<ParsedTime> {
    let s = s.trim();
    if s.is_empty() || super::exif::is_placeholder(s) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return plausible(&dt.naive_local()).then_some(ParsedTime::Absolute(dt));
    }

    let tidied = tidy(s);
    let (body, utc) = match tidied
        .strip_suffix(" UTC")
        .or_else(|| tidied.strip_suffix(" GMT"))
    {
        Some(body) => (body, true),
        None => (tidied.as_str(), false),
    };

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(body, format).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(body, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
        .filter(plausible)?;

    Some(if utc {
        ParsedTime::Absolute(naive.and_utc().fixed_offset())
    } else {
        ParsedTime::Local(naive)
    })
}
