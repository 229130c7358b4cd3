//! Media files discovered in a work directory

use crate::config::{Config, MediaKind};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::layout::ArchiveLayout;
use crate::metadata::{MetadataSource, RawMetadata};
use crate::naming::{self, CanonicalName};
use crate::time::{CaptureInstant, TimestampNormalizer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One file on disk with everything derived from it during a single pass
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub metadata: RawMetadata,
    pub instant: CaptureInstant,
    pub identity: Identity,
}

impl MediaFile {
    /// Extract metadata and derive the capture instant and identity
    pub fn inspect(
        path: &Path,
        kind: MediaKind,
        source: &dyn MetadataSource,
        normalizer: &TimestampNormalizer,
        identity_max_len: usize,
    ) -> Result<Self> {
        let metadata = source.extract(path, kind);
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        let instant = normalizer.normalize(path, &metadata, modified)?;
        let identity = Identity::extract(&metadata, identity_max_len);

        debug!(
            ?path,
            ?kind,
            tags = metadata.len(),
            stamp = %instant.stamp(),
            %identity,
            "Inspected media file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            metadata,
            instant,
            identity,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Canonical name of this file; a name that already is canonical is kept
    pub fn canonical_name(&self) -> CanonicalName {
        self.canonical_name_for(&self.file_name())
    }

    /// Canonical name of `original` using this file's capture time and identity
    pub fn canonical_name_for(&self, original: &str) -> CanonicalName {
        naming::resolve(&self.instant.stamp(), &self.identity, original)
    }
}

/// AppleDouble sidecars written by macOS on foreign volumes
fn is_apple_double(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("._"))
}

/// Recursively collect supported media files under `work_dir`
///
/// The layout's own output folders are never descended into. Results are
/// sorted so a batch is processed in a stable order.
pub fn discover(
    work_dir: &Path,
    config: &Config,
    layout: &ArchiveLayout,
) -> Result<Vec<(PathBuf, MediaKind)>> {
    if !work_dir.is_dir() {
        return Err(Error::InvalidWorkDir {
            path: work_dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(work_dir)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && layout.is_managed(e.path())))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || is_apple_double(path) {
            continue;
        }
        if let Some(kind) = config.kind_of_path(path) {
            files.push((path.to_path_buf(), kind));
        }
    }

    files.sort();
    debug!(?work_dir, count = files.len(), "Discovered media files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetaValue;
    use crate::time::{Confidence, TimeSource};
    use filetime::FileTime;

    fn setup() -> (tempfile::TempDir, Config, ArchiveLayout) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        let layout = ArchiveLayout::new(&config);
        layout.ensure().unwrap();
        (dir, config, layout)
    }

    fn normalizer() -> TimestampNormalizer {
        TimestampNormalizer::new(chrono_tz::Asia::Shanghai)
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let (dir, config, layout) = setup();
        let work = layout.staging();
        fs::create_dir_all(work.join("nested")).unwrap();
        fs::write(work.join("b.JPG"), b"1").unwrap();
        fs::write(work.join("a.mov"), b"2").unwrap();
        fs::write(work.join("nested").join("c.png"), b"3").unwrap();
        fs::write(work.join("notes.txt"), b"4").unwrap();
        fs::write(work.join("._b.JPG"), b"5").unwrap();

        let found = discover(work, &config, &layout).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|(p, _)| p.strip_prefix(work).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a.mov"), PathBuf::from("b.JPG"), PathBuf::from("nested/c.png")]
        );
        assert_eq!(found[0].1, MediaKind::Video);
        drop(dir);
    }

    #[test]
    fn test_discover_skips_layout_folders() {
        let (_dir, config, layout) = setup();
        fs::write(layout.root().join("loose.jpg"), b"1").unwrap();
        fs::create_dir_all(layout.month_dir("202401", MediaKind::Photo)).unwrap();
        fs::write(layout.month_dir("202401", MediaKind::Photo).join("in.jpg"), b"2").unwrap();
        fs::write(layout.snapshot().join("snap.jpg"), b"3").unwrap();

        let found = discover(layout.root(), &config, &layout).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].0.ends_with("loose.jpg"));
    }

    #[test]
    fn test_discover_invalid_dir() {
        let (dir, config, layout) = setup();
        let err = discover(&dir.path().join("missing"), &config, &layout).unwrap_err();
        assert!(matches!(err, Error::InvalidWorkDir { .. }));
    }

    #[test]
    fn test_inspect_uses_metadata() {
        let (dir, _config, _layout) = setup();
        let path = dir.path().join("IMG_0001.JPG");
        fs::write(&path, b"x").unwrap();

        let source = |_: &Path, _: MediaKind| -> RawMetadata {
            [
                ("DateTimeOriginal", MetaValue::from("2018:03:04 10:35:51")),
                ("Model", MetaValue::from("Canon EOS R5")),
            ]
            .into_iter()
            .collect()
        };
        let file = MediaFile::inspect(&path, MediaKind::Photo, &source, &normalizer(), 32).unwrap();
        assert_eq!(file.instant.source(), TimeSource::ExifDelimited);
        assert_eq!(
            file.canonical_name().file_name(),
            "20180304103551_Canon-EOS-R5_IMG-0001.jpg"
        );
    }

    #[test]
    fn test_inspect_falls_back_to_mtime() {
        let (dir, _config, _layout) = setup();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"x").unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

        let source = |_: &Path, _: MediaKind| RawMetadata::empty();
        let file = MediaFile::inspect(&path, MediaKind::Video, &source, &normalizer(), 32).unwrap();
        assert_eq!(file.instant.confidence(), Confidence::Fallback);
        assert!(file.identity.is_unknown());
        assert_eq!(file.canonical_name().file_name(), "20231115061320_unknown_clip.mp4");
    }

    #[test]
    fn test_canonical_file_keeps_its_name() {
        let (dir, _config, _layout) = setup();
        let path = dir.path().join("20180304103551_X100_IMG-1.jpg");
        fs::write(&path, b"x").unwrap();

        let source = |_: &Path, _: MediaKind| -> RawMetadata {
            [("Model", "Other Camera")].into_iter().collect()
        };
        let file = MediaFile::inspect(&path, MediaKind::Photo, &source, &normalizer(), 32).unwrap();
        assert_eq!(file.canonical_name().file_name(), "20180304103551_X100_IMG-1.jpg");
    }
}
