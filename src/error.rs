//! Error types for the media archiver

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media archiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No usable capture time for {path}: every rule and the fallback failed")]
    UnparseableTimestamp { path: PathBuf },

    #[error("Could not find a free name for {path} after {attempts} attempts")]
    PlacementExhausted { path: PathBuf, attempts: usize },

    #[error("Failed to move {from} to {to}: {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata unavailable for {path}: {message}")]
    ExtractionUnavailable { path: PathBuf, message: String },

    #[error("File hash computation failed for {path}: {message}")]
    HashComputation { path: PathBuf, message: String },

    #[error("Archive root {path} is not usable: {message}")]
    ArchiveRoot { path: PathBuf, message: String },

    #[error("Not a supported media file: {path}")]
    UnsupportedFile { path: PathBuf },

    #[error("Invalid work directory: {path}")]
    InvalidWorkDir { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl Error {
    /// Build a `MoveFailed` from an IO error raised while relocating `from`
    pub fn move_failed(from: &std::path::Path, to: &std::path::Path, source: std::io::Error) -> Self {
        Error::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }
}
