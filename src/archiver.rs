//! Archive engine exposing the public operations
//!
//! `stats`, `preview`, `fit`, `recover` and `rename` all work against one
//! explicitly configured root. Fingerprinting and metadata extraction run
//! in parallel; placement is strictly sequential.

use crate::config::{Config, MediaKind};
use crate::error::{Error, Result};
use crate::hash::{Fingerprint, fingerprint_all};
use crate::layout::ArchiveLayout;
use crate::media::{MediaFile, discover};
use crate::metadata::{MediaProbe, MetadataSource};
use crate::naming::CanonicalName;
use crate::place::{BatchReport, FileReport, Placer, move_no_clobber, strip_duplicate_marker};
use crate::stats::StatsSnapshot;
use crate::time::TimestampNormalizer;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, debug, info, span, warn};

type Analysis = (PathBuf, Result<(MediaFile, Fingerprint)>);

pub struct Archiver {
    config: Config,
    layout: ArchiveLayout,
    normalizer: TimestampNormalizer,
    source: Box<dyn MetadataSource>,
    interrupted: Arc<AtomicBool>,
}

impl Archiver {
    /// Engine reading metadata with EXIF and ffprobe
    pub fn new(config: Config) -> Result<Self> {
        Self::with_source(config, Box::new(MediaProbe))
    }

    pub fn with_source(config: Config, source: Box<dyn MetadataSource>) -> Result<Self> {
        // Configure Rayon thread pool
        if config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
                .ok(); // Ignore if already initialized
        }

        let normalizer = TimestampNormalizer::new(config.canonical_tz()?);
        let layout = ArchiveLayout::new(&config);
        debug!(root = ?layout.root(), timezone = %normalizer.timezone(), "Archiver ready");

        Ok(Self {
            config,
            layout,
            normalizer,
            source,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Flag that stops a running batch after the current file
    ///
    /// Once set it stays set for the life of this engine.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Current per-month counts of the archive
    pub fn stats(&self) -> Result<StatsSnapshot> {
        self.layout.check_root()?;
        StatsSnapshot::scan(&self.layout)
    }

    /// Where every media file in `work_dir` would go, without moving anything
    pub fn preview(&self, work_dir: &Path) -> Result<BTreeMap<PathBuf, PathBuf>> {
        let _span = span!(Level::INFO, "preview", ?work_dir).entered();
        self.layout.check_root()?;

        let files = discover(work_dir, &self.config, &self.layout)?;
        let mut placer = Placer::new(&self.layout, self.config.placement_retries);
        let mut plan = BTreeMap::new();

        for (path, analysis) in self.analyze(files) {
            let decided = analysis.and_then(|(file, fp)| {
                let decision = placer.decide(
                    &path,
                    &file.canonical_name(),
                    file.kind,
                    fp,
                    self.config.handle_duplicate,
                )?;
                placer.reserve(&path, &decision, fp)?;
                Ok(decision)
            });

            match decided {
                Ok(decision) => {
                    debug!(source = ?path, candidate = ?decision.target_path(), "Planned placement");
                    plan.insert(path, decision.target_path());
                }
                Err(e) => warn!(source = ?path, error = %e, "No placement possible"),
            }
        }

        Ok(plan)
    }

    /// Move every media file in `work_dir` (default: the staging folder)
    /// into the archive
    ///
    /// Per-file failures are reported and leave the file where it was; only
    /// an unusable archive root or work directory aborts the call.
    pub fn fit(&self, work_dir: Option<&Path>, handle_duplicate: bool) -> Result<BatchReport> {
        let work_dir = work_dir.unwrap_or(self.layout.staging());
        let _span = span!(Level::INFO, "fit", ?work_dir).entered();
        self.layout.ensure()?;

        info!(handle_duplicate, "Scanning work directory...");
        let files = discover(work_dir, &self.config, &self.layout)?;
        info!(count = files.len(), "Found media files");

        let analyzed = self.analyze(files);
        let total = analyzed.len();
        let mut placer = Placer::new(&self.layout, self.config.placement_retries);
        let mut batch = BatchReport::default();

        info!("Placing files...");
        for (done, (path, analysis)) in analyzed.into_iter().enumerate() {
            if self.is_interrupted() {
                batch.interrupted = true;
                batch.pending = total - done;
                warn!(pending = batch.pending, "Interrupted, stopping before next file");
                break;
            }

            let _file_span = span!(Level::DEBUG, "place_file", ?path).entered();
            let placed = analysis.and_then(|(file, fp)| {
                placer.place(&path, &file.canonical_name(), file.kind, fp, handle_duplicate)
            });
            batch.push(match placed {
                Ok((decision, dest)) => FileReport::placed(&path, &decision, dest),
                Err(e) => FileReport::failed(&path, &e),
            });
        }

        info!("{}", batch.summary());
        Ok(batch)
    }

    /// Return files from `duplicates/` to their archive slot where it is free
    ///
    /// Calling this again without an intervening `fit` changes nothing.
    pub fn recover(&self) -> Result<BatchReport> {
        let _span = span!(Level::INFO, "recover").entered();
        self.layout.ensure()?;

        let files = self.duplicate_entries()?;
        info!(count = files.len(), "Found files in duplicates folder");

        let paths: Vec<PathBuf> = files.iter().map(|(p, _)| p.clone()).collect();
        let fingerprints = fingerprint_all(&paths);
        let total = files.len();
        let mut placer = Placer::new(&self.layout, self.config.placement_retries);
        let mut batch = BatchReport::default();

        for (done, ((path, kind), (_, fingerprint))) in files.into_iter().zip(fingerprints).enumerate() {
            if self.is_interrupted() {
                batch.interrupted = true;
                batch.pending = total - done;
                warn!(pending = batch.pending, "Interrupted, stopping before next file");
                break;
            }

            let recovered = fingerprint.and_then(|fp| {
                let name = self.intended_name(&path, kind)?;
                let decision = placer.decide_recovery(&path, &name, kind, fp)?;
                let dest = placer.execute(&path, &decision, fp)?;
                Ok((decision, dest))
            });
            batch.push(match recovered {
                Ok((decision, dest)) => FileReport::placed(&path, &decision, dest).recovered(),
                Err(e) => FileReport::failed(&path, &e),
            });
        }

        info!("{}", batch.summary());
        Ok(batch)
    }

    /// Canonical name for a single file; renamed in place when `commit`
    pub fn rename(&self, file: &Path, commit: bool) -> Result<PathBuf> {
        fs::metadata(file)?;
        let kind = self
            .config
            .kind_of_path(file)
            .ok_or_else(|| Error::UnsupportedFile {
                path: file.to_path_buf(),
            })?;

        let media = self.inspect(file, kind)?;
        let candidate = file.with_file_name(media.canonical_name().file_name());
        if !commit || candidate == file {
            debug!(source = ?file, ?candidate, "Rename preview");
            return Ok(candidate);
        }

        move_no_clobber(file, &candidate).map_err(|e| Error::move_failed(file, &candidate, e))?;
        info!(source = ?file, destination = ?candidate, outcome = "renamed", "File renamed");
        Ok(candidate)
    }

    fn inspect(&self, path: &Path, kind: MediaKind) -> Result<MediaFile> {
        MediaFile::inspect(
            path,
            kind,
            self.source.as_ref(),
            &self.normalizer,
            self.config.identity_max_len,
        )
    }

    /// Fingerprint and inspect files in parallel, keeping discovery order
    fn analyze(&self, files: Vec<(PathBuf, MediaKind)>) -> Vec<Analysis> {
        let paths: Vec<PathBuf> = files.iter().map(|(p, _)| p.clone()).collect();
        info!(count = paths.len(), "Computing content fingerprints...");
        let fingerprints = fingerprint_all(&paths);

        files
            .into_par_iter()
            .zip(fingerprints.into_par_iter())
            .map(|((path, kind), (_, fingerprint))| {
                let analysis = fingerprint.and_then(|fp| Ok((self.inspect(&path, kind)?, fp)));
                (path, analysis)
            })
            .collect()
    }

    /// Media files directly inside `duplicates/`, sorted
    fn duplicate_entries(&self) -> Result<Vec<(PathBuf, MediaKind)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.layout.duplicates())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() || entry.file_name().to_string_lossy().starts_with("._") {
                continue;
            }
            let path = entry.path();
            if let Some(kind) = self.config.kind_of_path(&path) {
                files.push((path, kind));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Slot a file in `duplicates/` was meant for
    fn intended_name(&self, path: &Path, kind: MediaKind) -> Result<CanonicalName> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match CanonicalName::parse(&file_name) {
            Some(name) => Ok(strip_duplicate_marker(&name)),
            None => Ok(self.inspect(path, kind)?.canonical_name()),
        }
    }
}
