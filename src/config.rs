//! Configuration types for the media archiver

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of media, inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Photo files (jpg, png, raw)
    Photo,
    /// Video files (mov, mp4, ...)
    Video,
}

impl MediaKind {
    /// Get the type folder name used under `archive/YYYYMM/`
    pub fn folder_name(&self) -> &'static str {
        match self {
            MediaKind::Photo => "p",
            MediaKind::Video => "v",
        }
    }
}

/// Configuration for the archiver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archive root containing `archive/`, `duplicates/`, `snapshot/` and the staging folder
    pub root: PathBuf,

    /// Name of the default staging folder under the root
    pub staging_dir: String,

    /// IANA name of the canonical timezone every timestamp is rendered in
    pub timezone: String,

    /// Move true duplicates into `duplicates/` (otherwise leave them in place)
    pub handle_duplicate: bool,

    /// Maximum length of the device identity token in file names
    pub identity_max_len: usize,

    /// Number of fingerprint-suffixed names tried after a name collision
    pub placement_retries: usize,

    /// Number of threads for parallel fingerprinting (0 = auto)
    pub threads: usize,

    /// Directory for rotated log files
    pub log_dir: PathBuf,

    /// Number of rotated log files to keep
    pub max_log_files: usize,

    /// Supported photo extensions (lowercase, without dot)
    pub photo_extensions: Vec<String>,

    /// Supported video extensions (lowercase, without dot)
    pub video_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            staging_dir: "__process".into(),
            timezone: "Asia/Shanghai".into(),
            handle_duplicate: true,
            identity_max_len: 32,
            placement_retries: 3,
            threads: 0,
            log_dir: PathBuf::from(".logs"),
            max_log_files: 10,
            photo_extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "cr2".into(), "arw".into(),
            ],
            video_extensions: vec![
                "mov".into(), "mp4".into(), "avi".into(), "mkv".into(),
            ],
        }
    }
}

impl Config {
    /// Default configuration rooted at `root`
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Check if a file extension is a supported photo format
    pub fn is_photo(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.photo_extensions.iter().any(|e| e == &ext_lower)
    }

    /// Check if a file extension is a supported video format
    pub fn is_video(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.video_extensions.iter().any(|e| e == &ext_lower)
    }

    /// Get the media kind for a given extension
    pub fn kind_of(&self, ext: &str) -> Option<MediaKind> {
        if self.is_photo(ext) {
            Some(MediaKind::Photo)
        } else if self.is_video(ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Get the media kind of a path, `None` for unsupported files
    pub fn kind_of_path(&self, path: &Path) -> Option<MediaKind> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.kind_of(ext))
    }

    /// Parse the configured canonical timezone
    pub fn canonical_tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidTimezone {
                name: self.timezone.clone(),
                message: e.to_string(),
            })
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Archiver Configuration File
# This file uses TOML format (https://toml.io)

# Archive root. Holds archive/YYYYMM/{p,v}/, duplicates/, snapshot/
# and the staging folder below. Can also be given with --root or
# the MEDIA_ARCHIVE_ROOT environment variable.
root = "/data/media"

# Default work directory for `fit`, relative to the root
staging_dir = "__process"

# Canonical timezone (IANA name). Timestamps without an explicit
# offset are taken as already being local time in this zone.
timezone = "Asia/Shanghai"

# Move true duplicates into duplicates/ instead of leaving them in place
handle_duplicate = true

# Maximum length of the device label used in file names
identity_max_len = 32

# Fingerprint-suffixed names tried when a target name holds other content
placement_retries = 3

# Number of threads for fingerprinting (0 = auto-detect)
threads = 0

# Rotated log files
log_dir = ".logs"
max_log_files = 10

# Supported file extensions (case-insensitive)
photo_extensions = ["jpg", "jpeg", "png", "cr2", "arw"]
video_extensions = ["mov", "mp4", "avi", "mkv"]
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
    /// Timezone name is not a known IANA zone
    InvalidTimezone {
        name: String,
        message: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
            ConfigError::InvalidTimezone { name, message } => {
                write!(f, "Unknown timezone '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
            ConfigError::InvalidTimezone { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_case_insensitive() {
        let config = Config::default();
        assert_eq!(config.kind_of("JPG"), Some(MediaKind::Photo));
        assert_eq!(config.kind_of("Arw"), Some(MediaKind::Photo));
        assert_eq!(config.kind_of("MOV"), Some(MediaKind::Video));
        assert_eq!(config.kind_of("heic"), None);
        assert_eq!(config.kind_of_path(Path::new("a/b/clip.Mkv")), Some(MediaKind::Video));
        assert_eq!(config.kind_of_path(Path::new("notes.txt")), None);
        assert_eq!(config.kind_of_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_folder_names() {
        assert_eq!(MediaKind::Photo.folder_name(), "p");
        assert_eq!(MediaKind::Video.folder_name(), "v");
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::sample_config()).unwrap();
        assert_eq!(config.root, PathBuf::from("/data/media"));
        assert_eq!(config.staging_dir, "__process");
        assert!(config.handle_duplicate);
        assert_eq!(config.video_extensions.len(), 4);
        assert!(config.canonical_tz().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("root = \"/tmp/x\"\ntimezone = \"UTC\"").unwrap();
        assert_eq!(config.placement_retries, 3);
        assert_eq!(config.canonical_tz().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_invalid_timezone() {
        let mut config = Config::default();
        config.timezone = "Mars/Olympus".into();
        let err = config.canonical_tz().unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("archive.toml");
        let mut config = Config::with_root("/srv/photos");
        config.handle_duplicate = false;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.root, PathBuf::from("/srv/photos"));
        assert!(!loaded.handle_duplicate);
    }
}
