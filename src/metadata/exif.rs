//! EXIF tag extraction for photos

use super::{MetaValue, RawMetadata};
use crate::error::{Error, Result};
use exif::{Field, In, Reader, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Read every primary-IFD EXIF field of `path` into a tag map
///
/// ASCII fields keep their raw bytes, so vendor strings such as
/// `2018:03:04 10:35:51上午` reach the normalizer untouched.
pub fn read_exif_tags(path: &Path) -> Result<RawMetadata> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExtractionUnavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let tags: RawMetadata = exif
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .filter_map(|field| field_value(field).map(|value| (field.tag.to_string(), value)))
        .collect();

    trace!(?path, count = tags.len(), "Read EXIF tags");
    Ok(tags)
}

fn field_value(field: &Field) -> Option<MetaValue> {
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| MetaValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        Value::Undefined(..) => None,
        _ => Some(MetaValue::Text(field.display_value().to_string())),
    }
}
