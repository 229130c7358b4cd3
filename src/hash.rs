//! xxHash-based content fingerprints for duplicate detection
//!
//! Files are streamed through a 128-bit XXH3 hasher in fixed-size chunks, so
//! memory use stays flat regardless of video size. Fingerprints are only
//! compared for equality; they never address files.

use crate::error::{Error, Result};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::trace;
use xxhash_rust::xxh3::Xxh3;

/// Size of each read chunk (256KB)
const CHUNK_SIZE: usize = 256 * 1024;

/// Content signature of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Leading `len` hex digits, used to disambiguate colliding names
    pub fn short(&self, len: usize) -> String {
        let mut hex = self.to_string();
        hex.truncate(len);
        hex
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compute the fingerprint of a file by streaming its full content
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).map_err(|e| Error::HashComputation {
        path: path.to_path_buf(),
        message: format!("Failed to open file: {}", e),
    })?;

    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::HashComputation {
                    path: path.to_path_buf(),
                    message: format!("Failed to read file: {}", e),
                });
            }
        };
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }

    let fingerprint = Fingerprint(hasher.digest128());
    trace!(?path, size = total, %fingerprint, "Computed file fingerprint");
    Ok(fingerprint)
}

/// Fingerprint many files in parallel; failures are kept per file
pub fn fingerprint_all(paths: &[PathBuf]) -> Vec<(PathBuf, Result<Fingerprint>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), fingerprint_file(path)))
        .collect()
}
