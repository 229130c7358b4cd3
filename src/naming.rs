//! Canonical archive file names: `{timestamp}_{identity}_{stem}{.ext}`

use crate::identity::Identity;
use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

static CANONICAL_STEM: OnceLock<Regex> = OnceLock::new();

fn canonical_stem() -> &'static Regex {
    CANONICAL_STEM.get_or_init(|| Regex::new(r"^(\d{14})_([^_]+)_([^_]+)$").unwrap())
}

/// A file name split into its canonical parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalName {
    stamp: String,
    identity: Identity,
    stem: String,
    extension: String,
}

impl CanonicalName {
    /// Assemble the canonical name for an original file name
    pub fn build(stamp: &str, identity: &Identity, original: &str) -> Self {
        let (stem, extension) = split_name(original);
        Self {
            stamp: stamp.to_string(),
            identity: identity.clone(),
            stem: sanitize_stem(stem),
            extension: extension.to_lowercase(),
        }
    }

    /// Recognize a name this engine already produced
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = split_name(file_name);
        let caps = canonical_stem().captures(stem)?;
        let stamp = caps.get(1)?.as_str();
        NaiveDateTime::parse_from_str(stamp, crate::time::STAMP_FORMAT).ok()?;

        Some(Self {
            stamp: stamp.to_string(),
            identity: Identity::from_token(caps.get(2)?.as_str()),
            stem: caps.get(3)?.as_str().to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// `YYYYMM` taken from the timestamp part
    pub fn month_key(&self) -> &str {
        &self.stamp[..6]
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Same name with `-{suffix}` appended to the original stem
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            stem: format!("{}-{}", self.stem, suffix),
            ..self.clone()
        }
    }

    /// Same name with the stem replaced
    pub fn with_stem(&self, stem: &str) -> Self {
        Self {
            stem: stem.to_string(),
            ..self.clone()
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}_{}{}", self.stamp, self.identity, self.stem, self.extension)
    }
}

/// Parsed `original` when it already is canonical, built from its parts otherwise
pub fn resolve(stamp: &str, identity: &Identity, original: &str) -> CanonicalName {
    CanonicalName::parse(original).unwrap_or_else(|| CanonicalName::build(stamp, identity, original))
}

/// Canonical name for `original`, or `original` itself when it already is one
pub fn canonical_name(stamp: &str, identity: &Identity, original: &str) -> String {
    resolve(stamp, identity, original).file_name()
}

/// Stem placeholder when nothing printable is left
const EMPTY_STEM: &str = "-";

/// Underscores and whitespace would break the three-part split; `~` is
/// reserved for the duplicates marker
pub fn sanitize_stem(stem: &str) -> String {
    let sanitized: String = stem
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '_' || c == '~' || c.is_whitespace() { '-' } else { c })
        .collect();
    if sanitized.is_empty() {
        EMPTY_STEM.to_string()
    } else {
        sanitized
    }
}

/// Split into stem and extension (with its leading dot, possibly empty)
///
/// An extension containing `_` is really the tail of a dotted stem.
fn split_name(file_name: &str) -> (&str, &str) {
    let path = Path::new(file_name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) if !ext.contains('_') => {
            (stem, &file_name[file_name.len() - ext.len() - 1..])
        }
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> Identity {
        Identity::from_label("Canon EOS R5", 32)
    }

    #[test]
    fn test_build_name() {
        let name = canonical_name("20180304103551", &canon(), "IMG_0001 copy.JPG");
        assert_eq!(name, "20180304103551_Canon-EOS-R5_IMG-0001-copy.jpg");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "IMG_0001.JPG",
            "holiday photo.jpeg",
            "clip.MOV",
            "noext",
            "a.b.c.png",
            "PICTUR~1.JPG",
            "\u{7}.jpg",
            "\u{1b}\u{7}",
        ];
        for input in inputs {
            let once = canonical_name("20240101000000", &canon(), input);
            let twice = canonical_name("20991231235959", &Identity::unknown(), &once);
            assert_eq!(once, twice, "{}", input);
        }
    }

    #[test]
    fn test_already_canonical_is_untouched() {
        let name = "20180304103551_iPhone-X_IMG-1234.HEIC";
        assert_eq!(canonical_name("20000101000000", &canon(), name), name);
    }

    #[test]
    fn test_parse_parts() {
        let name = CanonicalName::parse("20180304103551_unknown_IMG-1234.mp4").unwrap();
        assert_eq!(name.month_key(), "201803");
        assert!(name.identity().is_unknown());
        assert_eq!(name.stem(), "IMG-1234");
        assert_eq!(name.with_suffix("ab12").file_name(), "20180304103551_unknown_IMG-1234-ab12.mp4");
    }

    #[test]
    fn test_parse_rejects() {
        assert!(CanonicalName::parse("IMG_0001.jpg").is_none());
        assert!(CanonicalName::parse("20180304103551_a_b_c.jpg").is_none());
        assert!(CanonicalName::parse("2018030410355_a_b.jpg").is_none());
        // Fourteen digits that are not a calendar time
        assert!(CanonicalName::parse("20181304103551_a_b.jpg").is_none());
    }

    #[test]
    fn test_invalid_stamp_prefix_is_renamed() {
        let name = canonical_name("20200101000000", &canon(), "99999999999999_x_y.jpg");
        assert_eq!(name, "20200101000000_Canon-EOS-R5_99999999999999-x-y.jpg");
    }

    #[test]
    fn test_dotted_identity_without_extension() {
        let id = Identity::from_label("Model 1.5", 32);
        let once = canonical_name("20200101000000", &id, "README");
        assert_eq!(once, "20200101000000_Model-1.5_README");
        assert_eq!(canonical_name("20200101000000", &canon(), &once), once);
    }

    #[test]
    fn test_tilde_is_not_kept() {
        assert_eq!(
            canonical_name("20240105120000", &Identity::from_label("X100", 32), "PICTUR~1.JPG"),
            "20240105120000_X100_PICTUR-1.jpg"
        );
    }

    #[test]
    fn test_control_only_stem() {
        let name = canonical_name("20240105120000", &Identity::from_label("X100", 32), "\u{7}.jpg");
        assert_eq!(name, "20240105120000_X100_-.jpg");
        assert!(CanonicalName::parse(&name).is_some());
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(
            canonical_name("20200101000000", &Identity::unknown(), "README"),
            "20200101000000_unknown_README"
        );
    }
}
