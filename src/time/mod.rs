//! Timestamp normalization
//!
//! Turns whatever capture-time representation the metadata carries into a
//! single instant in the canonical timezone, rendered as `YYYYMMDDHHMMSS`.
//!
//! Raw values are tried against an ordered list of [`ParseRule`]s:
//! 1. EXIF delimited `YYYY:MM:DD HH:MM:SS`
//! 2. The same with a trailing AM/PM glyph
//! 3. Unix epoch seconds or milliseconds
//! 4. ISO-8601-like strings
//! 5. Loose natural-language dates
//!
//! and the file modification time is the fallback. Values without an
//! explicit zone are taken as local time in the canonical timezone and are
//! not shifted; values with an offset are converted.

pub mod epoch;
pub mod exif;
pub mod iso;
pub mod natural;

use crate::error::{Error, Result};
use crate::metadata::{MetaValue, RawMetadata};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, trace, warn};

/// Metadata tags holding a capture time, in priority order
pub const TIME_TAGS: &[&str] = &[
    "DateTimeOriginal",
    "DateTimeDigitized",
    "DateTime",
    "creation_time",
    "com.apple.quicktime.creationdate",
];

/// Fixed-width output format of every normalized timestamp
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Which rule produced a capture instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSource {
    ExifDelimited,
    ExifMeridiem,
    UnixEpoch,
    Iso8601,
    NaturalLanguage,
    /// File system modification time
    FileModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Read from metadata
    Exact,
    /// Derived from the file modification time
    Fallback,
}

/// Output of a single parse rule, before timezone policy is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTime {
    /// Wall-clock time with no zone information
    Local(NaiveDateTime),
    /// Instant with an explicit offset
    Absolute(DateTime<FixedOffset>),
}

/// One recognized raw timestamp representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRule {
    ExifDelimited,
    ExifMeridiem,
    UnixEpoch,
    Iso8601,
    NaturalLanguage,
}

impl ParseRule {
    /// Rules in the order they are attempted
    pub const ORDERED: [ParseRule; 5] = [
        ParseRule::ExifDelimited,
        ParseRule::ExifMeridiem,
        ParseRule::UnixEpoch,
        ParseRule::Iso8601,
        ParseRule::NaturalLanguage,
    ];

    /// Attempt this rule on a raw value; `None` hands over to the next rule
    pub fn apply(&self, value: &MetaValue) -> Option<ParsedTime> {
        match self {
            ParseRule::ExifDelimited => exif::parse_delimited(value.as_text()?),
            ParseRule::ExifMeridiem => exif::parse_meridiem(value.as_text()?).map(ParsedTime::Local),
            ParseRule::UnixEpoch => {
                epoch::parse_epoch(value.as_integer()?).map(|dt| ParsedTime::Absolute(dt.fixed_offset()))
            }
            ParseRule::Iso8601 => iso::parse_iso(value.as_text()?),
            ParseRule::NaturalLanguage => natural::parse_natural(value.as_text()?),
        }
    }

    pub fn source(&self) -> TimeSource {
        match self {
            ParseRule::ExifDelimited => TimeSource::ExifDelimited,
            ParseRule::ExifMeridiem => TimeSource::ExifMeridiem,
            ParseRule::UnixEpoch => TimeSource::UnixEpoch,
            ParseRule::Iso8601 => TimeSource::Iso8601,
            ParseRule::NaturalLanguage => TimeSource::NaturalLanguage,
        }
    }
}

/// Capture time of a file, fixed in the canonical timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureInstant {
    instant: DateTime<Tz>,
    source: TimeSource,
    confidence: Confidence,
}

impl CaptureInstant {
    /// Only instants that render to exactly 14 digits are representable
    fn new(instant: DateTime<Tz>, source: TimeSource, confidence: Confidence) -> Option<Self> {
        (1000..=9999).contains(&instant.year()).then_some(Self {
            instant,
            source,
            confidence,
        })
    }

    pub fn instant(&self) -> DateTime<Tz> {
        self.instant
    }

    pub fn source(&self) -> TimeSource {
        self.source
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// `YYYYMMDDHHMMSS` in the canonical timezone
    pub fn stamp(&self) -> String {
        self.instant.format(STAMP_FORMAT).to_string()
    }
}

/// Parses raw metadata timestamps into canonical-timezone instants
#[derive(Debug, Clone, Copy)]
pub struct TimestampNormalizer {
    tz: Tz,
}

impl TimestampNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Resolve the capture instant of a file
    ///
    /// Tags in [`TIME_TAGS`] are tried in order; the first value any rule
    /// accepts wins. Without one, `modified` is used with
    /// [`Confidence::Fallback`].
    pub fn normalize(
        &self,
        path: &Path,
        meta: &RawMetadata,
        modified: Option<SystemTime>,
    ) -> Result<CaptureInstant> {
        if let Some(instant) = self.from_metadata(meta) {
            debug!(?path, source = ?instant.source(), stamp = %instant.stamp(), "Normalized capture time");
            return Ok(instant);
        }

        if let Some(instant) = modified.and_then(|m| self.from_system_time(m)) {
            warn!(?path, stamp = %instant.stamp(), "Using file modification time as fallback");
            return Ok(instant);
        }

        Err(Error::UnparseableTimestamp {
            path: path.to_path_buf(),
        })
    }

    pub fn from_metadata(&self, meta: &RawMetadata) -> Option<CaptureInstant> {
        TIME_TAGS.iter().find_map(|tag| {
            let value = meta.get(tag)?;
            let instant = self.parse_value(value);
            if instant.is_none() {
                trace!(tag, %value, "No rule accepted timestamp value");
            }
            instant
        })
    }

    /// Run the ordered rules over a single raw value
    pub fn parse_value(&self, value: &MetaValue) -> Option<CaptureInstant> {
        ParseRule::ORDERED.iter().find_map(|rule| {
            let parsed = rule.apply(value)?;
            let instant = self.resolve(parsed)?;
            CaptureInstant::new(instant, rule.source(), Confidence::Exact)
        })
    }

    pub fn parse_str(&self, s: &str) -> Option<CaptureInstant> {
        self.parse_value(&MetaValue::from(s))
    }

    pub fn from_system_time(&self, time: SystemTime) -> Option<CaptureInstant> {
        let utc: DateTime<Utc> = time.into();
        CaptureInstant::new(
            utc.with_timezone(&self.tz),
            TimeSource::FileModified,
            Confidence::Fallback,
        )
    }

    /// Apply the timezone policy: naive values are already canonical local time
    fn resolve(&self, parsed: ParsedTime) -> Option<DateTime<Tz>> {
        match parsed {
            ParsedTime::Absolute(dt) => Some(dt.with_timezone(&self.tz)),
            ParsedTime::Local(naive) => self
                .tz
                .from_local_datetime(&naive)
                .earliest()
                // Wall-clock time skipped by a DST jump
                .or_else(|| self.tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shanghai() -> TimestampNormalizer {
        TimestampNormalizer::new(chrono_tz::Asia::Shanghai)
    }

    fn stamp(s: &str) -> String {
        shanghai().parse_str(s).unwrap().stamp()
    }

    #[test]
    fn test_meridiem_round_trip() {
        assert_eq!(stamp("2018:03:04 10:35:51上午"), "20180304103551");
        assert_eq!(stamp("2018:05:25 21:23:28下午"), "20180525212328");
    }

    #[test]
    fn test_naive_values_are_not_shifted() {
        assert_eq!(stamp("2024:12:13 20:28:39"), "20241213202839");
        assert_eq!(stamp("2024-12-13T20:28:39"), "20241213202839");
        assert_eq!(stamp("December 13, 2024 20:28:39"), "20241213202839");
    }

    #[test]
    fn test_zoned_values_are_converted() {
        assert_eq!(stamp("2024-01-15T14:30:00Z"), "20240115223000");
        assert_eq!(stamp("2024-01-15T14:30:00+08:00"), "20240115143000");
        assert_eq!(stamp("2024:01:15 23:30:00-01:00"), "20240116083000");
    }

    #[test]
    fn test_epoch_units_agree() {
        let n = shanghai();
        let secs = n.parse_value(&MetaValue::Integer(1_700_000_000)).unwrap();
        let millis = n.parse_value(&MetaValue::Integer(1_700_000_000_000)).unwrap();
        assert_eq!(secs.stamp(), millis.stamp());
        assert_eq!(secs.stamp(), "20231115061320");
        assert_eq!(stamp("1700000000"), "20231115061320");
        assert_eq!(secs.source(), TimeSource::UnixEpoch);
    }

    #[test]
    fn test_rule_tags() {
        let n = shanghai();
        assert_eq!(n.parse_str("2018:03:04 10:35:51").unwrap().source(), TimeSource::ExifDelimited);
        assert_eq!(n.parse_str("2018:03:04 10:35:51上午").unwrap().source(), TimeSource::ExifMeridiem);
        assert_eq!(n.parse_str("2018-03-04T10:35:51Z").unwrap().source(), TimeSource::Iso8601);
        assert_eq!(n.parse_str("4 March 2018").unwrap().source(), TimeSource::NaturalLanguage);
        assert_eq!(n.parse_str("20180304103551").unwrap().stamp(), "20180304103551");
    }

    #[test]
    fn test_tag_priority_and_placeholders() {
        let meta: RawMetadata = [
            ("DateTimeOriginal", "0000:00:00 00:00:00"),
            ("DateTimeDigitized", "garbage"),
            ("DateTime", "2020:02:29 08:00:00"),
            ("creation_time", "2021-01-01T00:00:00Z"),
        ]
        .into_iter()
        .collect();

        let instant = shanghai().from_metadata(&meta).unwrap();
        assert_eq!(instant.stamp(), "20200229080000");
        assert_eq!(instant.confidence(), Confidence::Exact);
    }

    #[test]
    fn test_fallback_to_modification_time() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let instant = shanghai()
            .normalize(Path::new("a.jpg"), &RawMetadata::empty(), Some(modified))
            .unwrap();
        assert_eq!(instant.stamp(), "20231115061320");
        assert_eq!(instant.source(), TimeSource::FileModified);
        assert_eq!(instant.confidence(), Confidence::Fallback);
    }

    #[test]
    fn test_unparseable_without_fallback() {
        let meta: RawMetadata = [("DateTime", "not a time")].into_iter().collect();
        let err = shanghai().normalize(Path::new("a.jpg"), &meta, None).unwrap_err();
        assert!(matches!(err, Error::UnparseableTimestamp { .. }));
    }

    #[test]
    fn test_other_canonical_zone() {
        let utc = TimestampNormalizer::new(chrono_tz::UTC);
        assert_eq!(utc.parse_str("2024-01-15T14:30:00+08:00").unwrap().stamp(), "20240115063000");
        assert_eq!(utc.parse_str("2024:01:15 14:30:00").unwrap().stamp(), "20240115143000");
    }

    #[test]
    fn test_dst_gap_moves_forward() {
        // 2024-03-10 02:30 does not exist in New York
        let ny = TimestampNormalizer::new(chrono_tz::America::New_York);
        assert_eq!(ny.parse_str("2024:03:10 02:30:00").unwrap().stamp(), "20240310033000");
    }
}
