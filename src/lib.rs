//! Media Archiver - deterministic archiving of photos and videos
//!
//! This library moves media files into a fixed archive layout:
//! - Capture time normalized to one canonical timezone from EXIF, video
//!   container tags, epoch values or free-form dates
//! - Canonical `{timestamp}_{device}_{stem}.ext` file names, idempotent
//! - `archive/YYYYMM/{p,v}/` month and type folders, `snapshot/` for
//!   unidentified devices
//! - xxHash content fingerprints to quarantine true duplicates
//! - No-clobber moves that never lose a file
//! - Per-month inventory with before/after comparison

pub mod archiver;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod identity;
pub mod layout;
pub mod media;
pub mod metadata;
pub mod naming;
pub mod place;
pub mod stats;
pub mod time;

pub use archiver::Archiver;
pub use cli::Cli;
pub use config::{Config, ConfigError, MediaKind};
pub use error::{Error, Result};
pub use layout::ArchiveLayout;
pub use metadata::{MediaProbe, MetadataSource, RawMetadata};
pub use place::{BatchReport, FileReport, Outcome};
pub use stats::{StatsDelta, StatsSnapshot, compare};
pub use time::{CaptureInstant, TimestampNormalizer};
