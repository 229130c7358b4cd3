//! Video container tags via FFprobe

use super::{MetaValue, RawMetadata};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::trace;

/// Cached FFprobe availability check
static FFPROBE_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Check if ffprobe is available (cached)
fn is_ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE.get_or_init(|| Command::new("ffprobe").arg("-version").output().is_ok())
}

/// Run FFprobe on `path` and collect format and stream tags
pub fn read_video_tags(path: &Path) -> Result<RawMetadata> {
    if !is_ffprobe_available() {
        return Err(Error::ExtractionUnavailable {
            path: path.to_path_buf(),
            message: "ffprobe not found in PATH".to_string(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| Error::ExtractionUnavailable {
            path: path.to_path_buf(),
            message: format!("Failed to execute ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(Error::ExtractionUnavailable {
            path: path.to_path_buf(),
            message: format!(
                "FFprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let json: Value = serde_json::from_slice(&output.stdout)?;
    let tags = collect_tags(&json);
    trace!(?path, count = tags.len(), "Read FFprobe tags");
    Ok(tags)
}

/// Flatten FFprobe JSON into one tag map; format tags win over stream tags
fn collect_tags(json: &Value) -> RawMetadata {
    let mut tags: BTreeMap<String, MetaValue> = BTreeMap::new();

    let stream_tags = json
        .get("streams")
        .and_then(|s| s.as_array())
        .into_iter()
        .flatten()
        .filter_map(|stream| stream.get("tags"));
    let format_tags = json.get("format").and_then(|f| f.get("tags"));

    for source in format_tags.into_iter().chain(stream_tags) {
        let Some(object) = source.as_object() else {
            continue;
        };
        for (key, value) in object {
            let value = match value {
                Value::String(s) => MetaValue::Text(s.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => MetaValue::Integer(i),
                    None => MetaValue::Float(n.as_f64().unwrap_or_default()),
                },
                _ => continue,
            };
            tags.entry(key.clone()).or_insert(value);
        }
    }

    tags.into_iter().collect()
}
