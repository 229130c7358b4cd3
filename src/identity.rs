//! Device identity extraction
//!
//! The identity is embedded verbatim in archive file names, so it is
//! reduced to a single filesystem-safe token without `_` (the canonical
//! name separator).

use crate::metadata::RawMetadata;
use serde::Serialize;
use std::fmt;

/// Metadata tags naming the capture device, in priority order
pub const MODEL_TAGS: &[&str] = &["Model", "com.apple.quicktime.model", "major_brand"];

/// Sentinel for files without a resolvable device
pub const UNKNOWN: &str = "unknown";

/// Characters never allowed in the token
const ILLEGAL: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '_'];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn unknown() -> Self {
        Identity(UNKNOWN.to_string())
    }

    /// Sanitize an arbitrary device label, falling back to [`UNKNOWN`]
    pub fn from_label(label: &str, max_len: usize) -> Self {
        let mut token = String::with_capacity(label.len());
        let mut pending_hyphen = false;

        for c in label.chars() {
            if c.is_whitespace() || c == '_' {
                pending_hyphen = true;
            } else if c.is_control() || ILLEGAL.contains(&c) {
                continue;
            } else {
                if pending_hyphen && !token.is_empty() {
                    token.push('-');
                }
                pending_hyphen = false;
                token.push(c);
            }
        }

        let token: String = token.chars().take(max_len).collect();
        let token = token.trim_matches(|c: char| c == '-' || c == '.');

        if token.is_empty() {
            Self::unknown()
        } else {
            Identity(token.to_string())
        }
    }

    /// Look up the device model in metadata
    pub fn extract(meta: &RawMetadata, max_len: usize) -> Self {
        meta.first_text(MODEL_TAGS)
            .map(|label| Self::from_label(label, max_len))
            .unwrap_or_else(Self::unknown)
    }

    /// Wrap a token already taken from a canonical file name
    pub(crate) fn from_token(token: &str) -> Self {
        Identity(token.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetaValue;

    fn meta(pairs: &[(&str, &str)]) -> RawMetadata {
        pairs.iter().map(|(k, v)| (*k, MetaValue::from(*v))).collect()
    }

    #[test]
    fn test_sanitize_whitespace_and_illegal() {
        assert_eq!(Identity::from_label("Canon EOS  R5", 32).as_str(), "Canon-EOS-R5");
        assert_eq!(Identity::from_label("  iPhone 15 Pro\t", 32).as_str(), "iPhone-15-Pro");
        assert_eq!(Identity::from_label("a/b\\c:d*e?f", 32).as_str(), "abcdef");
        assert_eq!(Identity::from_label("DSC_RX100\u{7}", 32).as_str(), "DSC-RX100");
        assert_eq!(Identity::from_label("ILCE-7M3", 32).as_str(), "ILCE-7M3");
    }

    #[test]
    fn test_length_cap() {
        let id = Identity::from_label("A Very Long Camera Model Name Indeed", 10);
        assert_eq!(id.as_str(), "A-Very-Lon");
        assert!(Identity::from_label("abc def", 4).as_str().len() <= 4);
        assert_eq!(Identity::from_label("abc def", 4).as_str(), "abc");
    }

    #[test]
    fn test_unknown_fallbacks() {
        assert!(Identity::extract(&RawMetadata::empty(), 32).is_unknown());
        assert!(Identity::extract(&meta(&[("Model", "   ")]), 32).is_unknown());
        assert!(Identity::from_label("///", 32).is_unknown());
    }

    #[test]
    fn test_tag_priority() {
        let m = meta(&[("major_brand", "qt  "), ("com.apple.quicktime.model", "iPhone 12")]);
        assert_eq!(Identity::extract(&m, 32).as_str(), "iPhone-12");

        let m = meta(&[("major_brand", "isom"), ("Model", "")]);
        assert_eq!(Identity::extract(&m, 32).as_str(), "isom");
    }
}
