//! On-disk archive layout
//!
//! ```text
//! root/
//!   archive/YYYYMM/{p,v}/
//!   duplicates/
//!   snapshot/
//!   __process/          (default staging folder)
//! ```

use crate::config::{Config, MediaKind};
use crate::error::{Error, Result};
use crate::naming::CanonicalName;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ARCHIVE_DIR: &str = "archive";
pub const DUPLICATES_DIR: &str = "duplicates";
pub const SNAPSHOT_DIR: &str = "snapshot";

#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
    archive: PathBuf,
    duplicates: PathBuf,
    snapshot: PathBuf,
    staging: PathBuf,
}

impl ArchiveLayout {
    pub fn new(config: &Config) -> Self {
        let root = config.root.clone();
        Self {
            archive: root.join(ARCHIVE_DIR),
            duplicates: root.join(DUPLICATES_DIR),
            snapshot: root.join(SNAPSHOT_DIR),
            staging: root.join(&config.staging_dir),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn duplicates(&self) -> &Path {
        &self.duplicates
    }

    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    /// Fail unless the root is an existing directory
    pub fn check_root(&self) -> Result<()> {
        let meta = fs::metadata(&self.root).map_err(|e| Error::ArchiveRoot {
            path: self.root.clone(),
            message: e.to_string(),
        })?;
        if !meta.is_dir() {
            return Err(Error::ArchiveRoot {
                path: self.root.clone(),
                message: "not a directory".to_string(),
            });
        }
        Ok(())
    }

    /// Verify the root and create the layout folders
    ///
    /// Any failure here is fatal for a whole batch.
    pub fn ensure(&self) -> Result<()> {
        self.check_root()?;
        for dir in [&self.archive, &self.duplicates, &self.snapshot, &self.staging] {
            fs::create_dir_all(dir).map_err(|e| Error::ArchiveRoot {
                path: dir.clone(),
                message: e.to_string(),
            })?;
        }

        debug!(root = ?self.root, "Archive layout ready");
        Ok(())
    }

    /// `archive/YYYYMM/{p,v}`
    pub fn month_dir(&self, month_key: &str, kind: MediaKind) -> PathBuf {
        self.archive.join(month_key).join(kind.folder_name())
    }

    /// Folder a canonically named file belongs in: `snapshot/` when the
    /// identity is unknown, the month/type folder otherwise
    pub fn target_dir(&self, name: &CanonicalName, kind: MediaKind) -> PathBuf {
        if name.identity().is_unknown() {
            self.snapshot.clone()
        } else {
            self.month_dir(name.month_key(), kind)
        }
    }

    /// Whether `path` lies in one of the managed output folders
    pub fn is_managed(&self, path: &Path) -> bool {
        path.starts_with(&self.archive)
            || path.starts_with(&self.duplicates)
            || path.starts_with(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn test_target_dirs() {
        let layout = ArchiveLayout::new(&Config::with_root("/media"));
        let known = CanonicalName::build("20180304103551", &Identity::from_label("X100", 32), "a.jpg");
        let unknown = CanonicalName::build("20180304103551", &Identity::unknown(), "a.mov");

        assert_eq!(
            layout.target_dir(&known, MediaKind::Photo),
            PathBuf::from("/media/archive/201803/p")
        );
        assert_eq!(
            layout.target_dir(&known, MediaKind::Video),
            PathBuf::from("/media/archive/201803/v")
        );
        assert_eq!(layout.target_dir(&unknown, MediaKind::Video), PathBuf::from("/media/snapshot"));
        assert_eq!(layout.staging(), Path::new("/media/__process"));
    }

    #[test]
    fn test_is_managed() {
        let layout = ArchiveLayout::new(&Config::with_root("/media"));
        assert!(layout.is_managed(Path::new("/media/archive/201803/p/x.jpg")));
        assert!(layout.is_managed(Path::new("/media/duplicates")));
        assert!(!layout.is_managed(Path::new("/media/__process/x.jpg")));
        assert!(!layout.is_managed(Path::new("/media/archived/x.jpg")));
    }

    #[test]
    fn test_ensure_creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(&Config::with_root(dir.path()));
        layout.ensure().unwrap();
        assert!(layout.archive().is_dir());
        assert!(layout.duplicates().is_dir());
        assert!(layout.snapshot().is_dir());
        assert!(layout.staging().is_dir());
        // Idempotent
        layout.ensure().unwrap();
    }

    #[test]
    fn test_ensure_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(&Config::with_root(dir.path().join("absent")));
        assert!(matches!(layout.ensure(), Err(Error::ArchiveRoot { .. })));
        assert!(!dir.path().join("absent").exists());
    }
}
