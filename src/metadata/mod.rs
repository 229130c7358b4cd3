//! Raw metadata handed over by the extraction collaborators
//!
//! The archiver never assumes a tag is present. Extractors produce a
//! [`RawMetadata`] mapping and every consumer goes through the typed
//! accessors, each of which returns an `Option`.

pub mod exif;
pub mod video;

use crate::config::MediaKind;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Untyped metadata value as reported by an extractor
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl MetaValue {
    /// Value as text, trimmed of padding and NUL terminators
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s.trim_matches(|c: char| c.is_whitespace() || c == '\0')),
            _ => None,
        }
    }

    /// Value as an integer, accepting all-digit text
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetaValue::Integer(i) => Some(*i),
            MetaValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            MetaValue::Text(_) => {
                let s = self.as_text()?;
                if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => write!(f, "{}", s),
            MetaValue::Integer(i) => write!(f, "{}", i),
            MetaValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Integer(i)
    }
}

/// Immutable tag-name to value mapping for one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    tags: BTreeMap<String, MetaValue>,
}

impl RawMetadata {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn get(&self, tag: &str) -> Option<&MetaValue> {
        self.tags.get(tag)
    }

    /// Text value of `tag`, `None` when absent, non-text or blank
    pub fn text(&self, tag: &str) -> Option<&str> {
        self.get(tag)
            .and_then(MetaValue::as_text)
            .filter(|s| !s.is_empty())
    }

    /// First non-blank text value among `tags`
    pub fn first_text(&self, tags: &[&str]) -> Option<&str> {
        tags.iter().find_map(|tag| self.text(tag))
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for RawMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// External metadata collaborator
///
/// Implementations must not fail: an unreadable or foreign file yields an
/// empty mapping, which sends the normalizer to its fallback path.
pub trait MetadataSource: Send + Sync {
    fn extract(&self, path: &Path, kind: MediaKind) -> RawMetadata;
}

impl<F> MetadataSource for F
where
    F: Fn(&Path, MediaKind) -> RawMetadata + Send + Sync,
{
    fn extract(&self, path: &Path, kind: MediaKind) -> RawMetadata {
        self(path, kind)
    }
}

/// EXIF for photos, FFprobe for videos
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaProbe;

impl MetadataSource for MediaProbe {
    fn extract(&self, path: &Path, kind: MediaKind) -> RawMetadata {
        let result = match kind {
            MediaKind::Photo => exif::read_exif_tags(path),
            MediaKind::Video => video::read_video_tags(path),
        };

        match result {
            Ok(meta) => meta,
            Err(e) => {
                debug!(?path, error = %e, "Metadata unavailable, continuing with empty tags");
                RawMetadata::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawMetadata {
        [
            ("Model", MetaValue::from("  Canon EOS R5\0")),
            ("Blank", MetaValue::from("   ")),
            ("Epoch", MetaValue::from(1700000000i64)),
            ("EpochText", MetaValue::from("1700000000000")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_text_accessor_trims() {
        let meta = sample();
        assert_eq!(meta.text("Model"), Some("Canon EOS R5"));
        assert_eq!(meta.text("Blank"), None);
        assert_eq!(meta.text("Missing"), None);
        assert_eq!(meta.text("Epoch"), None);
    }

    #[test]
    fn test_first_text_respects_order() {
        let meta = sample();
        assert_eq!(meta.first_text(&["Blank", "Missing", "Model"]), Some("Canon EOS R5"));
        assert!(meta.first_text(&["Nope", "Blank"]).is_none());
    }

    #[test]
    fn test_closure_source() {
        let source = |_: &Path, kind: MediaKind| -> RawMetadata {
            [("Kind", format!("{:?}", kind))].into_iter().collect()
        };
        let meta = source.extract(Path::new("x.jpg"), MediaKind::Photo);
        assert_eq!(meta.text("Kind"), Some("Photo"));
    }

    #[test]
    fn test_probe_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_really.jpg");
        std::fs::write(&path, b"plain bytes, no exif").unwrap();
        assert!(MediaProbe.extract(&path, MediaKind::Photo).is_empty());
        assert!(MediaProbe.extract(&dir.path().join("missing.jpg"), MediaKind::Photo).is_empty());
    }
}
