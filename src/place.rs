//! Placement resolver
//!
//! Decides where each file ends up and performs the move:
//!
//! 1. Target folder is `snapshot/` for an unknown identity, else
//!    `archive/YYYYMM/{p,v}/` from the canonical name.
//! 2. Identical content already in the target folder makes the file a
//!    duplicate: it goes to `duplicates/`, or stays put when duplicate
//!    handling is off.
//! 3. A free target name is taken with a no-clobber move.
//! 4. A target name held by different content is retried with a suffix
//!    from the incoming fingerprint, up to the configured retry cap.
//!
//! A move never overwrites and never deletes the source before the
//! destination holds the full content, so a failed file stays where it was.

use crate::config::MediaKind;
use crate::error::{Error, Result};
use crate::hash::{Fingerprint, fingerprint_file};
use crate::layout::ArchiveLayout;
use crate::naming::CanonicalName;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Upper bound for `~N` markers in `duplicates/`
const MAX_DUPLICATE_MARKER: usize = 9999;

/// Copy buffer for cross-volume moves (256KB)
const COPY_BUFFER_SIZE: usize = 256 * 1024;

static DUPLICATE_MARKER: OnceLock<Regex> = OnceLock::new();

fn duplicate_marker() -> &'static Regex {
    DUPLICATE_MARKER.get_or_init(|| Regex::new(r"^(.+)~\d+$").unwrap())
}

/// Why a file stays where it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Already at its canonical location
    InPlace,
    /// Same content already sits in the target folder
    Identical { twin: PathBuf },
    /// Target name is held by another file
    SlotOccupied { occupant: PathBuf },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InPlace => write!(f, "already in place"),
            SkipReason::Identical { twin } => write!(f, "identical to {}", twin.display()),
            SkipReason::SlotOccupied { occupant } => {
                write!(f, "target {} is occupied", occupant.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Archive,
    Snapshot,
    Duplicate { twin: PathBuf },
    SkipUnchanged(SkipReason),
}

/// Where a single file goes and what kind of move that is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementDecision {
    pub destination_root: PathBuf,
    pub file_name: String,
    pub action: Action,
}

impl PlacementDecision {
    fn skip(source: &Path, reason: SkipReason) -> Self {
        Self {
            destination_root: source.parent().map(Path::to_path_buf).unwrap_or_default(),
            file_name: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            action: Action::SkipUnchanged(reason),
        }
    }

    /// Final path of the file once the decision is carried out
    pub fn target_path(&self) -> PathBuf {
        self.destination_root.join(&self.file_name)
    }

    pub fn is_move(&self) -> bool {
        !matches!(self.action, Action::SkipUnchanged(_))
    }
}

#[derive(Debug)]
struct Indexed {
    path: PathBuf,
    size: u64,
    fingerprint: Option<Fingerprint>,
}

/// Lazily loaded view of target folders for duplicate and occupancy checks
///
/// Each folder is listed once; fingerprints of existing files are computed
/// only when an incoming file has the same size. Placements made during the
/// pass are recorded so later files see them without a rescan.
#[derive(Debug, Default)]
pub struct ContentIndex {
    dirs: HashMap<PathBuf, Vec<Indexed>>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&mut self, dir: &Path) -> Result<&mut Vec<Indexed>> {
        match self.dirs.entry(dir.to_path_buf()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(load_dir(dir)?)),
        }
    }

    /// A file in `dir` other than `exclude` with the given content
    pub fn find_twin(
        &mut self,
        dir: &Path,
        exclude: &Path,
        size: u64,
        fingerprint: Fingerprint,
    ) -> Result<Option<PathBuf>> {
        for entry in self.entries(dir)?.iter_mut() {
            if entry.size != size || entry.path == exclude {
                continue;
            }
            let existing = match entry.fingerprint {
                Some(fp) => fp,
                None => {
                    let fp = fingerprint_file(&entry.path)?;
                    entry.fingerprint = Some(fp);
                    fp
                }
            };
            if existing == fingerprint {
                return Ok(Some(entry.path.clone()));
            }
        }
        Ok(None)
    }

    /// Whether anything exists at `path`, on disk or recorded in this pass
    pub fn is_occupied(&mut self, path: &Path) -> Result<bool> {
        if fs::symlink_metadata(path).is_ok() {
            return Ok(true);
        }
        match path.parent() {
            Some(dir) => Ok(self.entries(dir)?.iter().any(|e| e.path == path)),
            None => Ok(false),
        }
    }

    /// Note a file now present (or planned) at `path`
    pub fn record(&mut self, path: &Path, size: u64, fingerprint: Fingerprint) -> Result<()> {
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        let entries = self.entries(dir)?;
        entries.retain(|e| e.path != path);
        entries.push(Indexed {
            path: path.to_path_buf(),
            size,
            fingerprint: Some(fingerprint),
        });
        Ok(())
    }

    /// Drop a file that was moved away
    pub fn forget(&mut self, path: &Path) {
        if let Some(entries) = path.parent().and_then(|dir| self.dirs.get_mut(dir)) {
            entries.retain(|e| e.path != path);
        }
    }

    /// Discard a folder listing so it is reloaded on next use
    pub fn invalidate(&mut self, dir: &Path) {
        self.dirs.remove(dir);
    }
}

fn load_dir(dir: &Path) -> Result<Vec<Indexed>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() {
            entries.push(Indexed {
                path: entry.path(),
                size: meta.len(),
                fingerprint: None,
            });
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Canonical name with a trailing `~N` duplicates marker removed
pub fn strip_duplicate_marker(name: &CanonicalName) -> CanonicalName {
    match duplicate_marker().captures(name.stem()).and_then(|c| c.get(1)) {
        Some(stem) => name.with_stem(stem.as_str()),
        None => name.clone(),
    }
}

/// Move `source` to `dest` only if `dest` does not exist
///
/// A hard link claims the destination atomically; the source is unlinked
/// afterwards. Where linking is impossible (other volume, unsupported
/// filesystem) the content is copied into a freshly created file instead.
/// An existing destination is reported as `AlreadyExists` and left alone.
pub fn move_no_clobber(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::hard_link(source, dest) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(dest);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            debug!(?source, ?dest, error = %e, "Hard link unavailable, copying instead");
            copy_no_clobber(source, dest)
        }
    }
}

fn copy_no_clobber(source: &Path, dest: &Path) -> io::Result<()> {
    let dest_file = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let result = copy_into(source, dest_file).and_then(|()| fs::remove_file(source));
    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

fn copy_into(source: &Path, dest_file: File) -> io::Result<()> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, File::open(source)?);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..bytes_read])?;
    }

    let dest_file = writer.into_inner().map_err(|e| e.into_error())?;
    dest_file.sync_all()?;

    // Preserve modification time
    if let Ok(mtime) = fs::metadata(source).and_then(|m| m.modified()) {
        let _ = filetime::set_file_handle_times(
            &dest_file,
            None,
            Some(filetime::FileTime::from_system_time(mtime)),
        );
    }
    Ok(())
}

/// Stateful resolver for one batch
pub struct Placer<'a> {
    layout: &'a ArchiveLayout,
    retries: usize,
    index: ContentIndex,
}

impl<'a> Placer<'a> {
    pub fn new(layout: &'a ArchiveLayout, retries: usize) -> Self {
        Self {
            layout,
            retries,
            index: ContentIndex::new(),
        }
    }

    /// Decide the destination of an incoming file without touching it
    pub fn decide(
        &mut self,
        source: &Path,
        name: &CanonicalName,
        kind: MediaKind,
        fingerprint: Fingerprint,
        handle_duplicate: bool,
    ) -> Result<PlacementDecision> {
        let dir = self.layout.target_dir(name, kind);
        if source == dir.join(name.file_name()) {
            return Ok(PlacementDecision::skip(source, SkipReason::InPlace));
        }

        let size = fs::metadata(source)?.len();
        if let Some(twin) = self.index.find_twin(&dir, source, size, fingerprint)? {
            if !handle_duplicate {
                return Ok(PlacementDecision::skip(source, SkipReason::Identical { twin }));
            }
            return Ok(PlacementDecision {
                destination_root: self.layout.duplicates().to_path_buf(),
                file_name: self.free_duplicate_name(source, name)?,
                action: Action::Duplicate { twin },
            });
        }

        let action = if name.identity().is_unknown() {
            Action::Snapshot
        } else {
            Action::Archive
        };

        for attempt in 0..=self.retries {
            let candidate = if attempt == 0 {
                name.clone()
            } else {
                name.with_suffix(&fingerprint.short(8 + 4 * (attempt - 1)))
            };
            let path = dir.join(candidate.file_name());
            if path == source {
                return Ok(PlacementDecision::skip(source, SkipReason::InPlace));
            }
            if !self.index.is_occupied(&path)? {
                return Ok(PlacementDecision {
                    destination_root: dir,
                    file_name: candidate.file_name(),
                    action,
                });
            }
            debug!(?source, target = ?path, attempt, "Target name taken by different content");
        }

        Err(Error::PlacementExhausted {
            path: source.to_path_buf(),
            attempts: self.retries + 1,
        })
    }

    /// Decide whether a file in `duplicates/` can return to its slot
    ///
    /// No suffixing: an occupied slot or content already present in the
    /// target folder leaves the file where it is.
    pub fn decide_recovery(
        &mut self,
        source: &Path,
        name: &CanonicalName,
        kind: MediaKind,
        fingerprint: Fingerprint,
    ) -> Result<PlacementDecision> {
        let dir = self.layout.target_dir(name, kind);
        let target = dir.join(name.file_name());
        if self.index.is_occupied(&target)? {
            return Ok(PlacementDecision::skip(source, SkipReason::SlotOccupied { occupant: target }));
        }

        let size = fs::metadata(source)?.len();
        if let Some(twin) = self.index.find_twin(&dir, source, size, fingerprint)? {
            return Ok(PlacementDecision::skip(source, SkipReason::Identical { twin }));
        }

        Ok(PlacementDecision {
            destination_root: dir,
            file_name: name.file_name(),
            action: if name.identity().is_unknown() {
                Action::Snapshot
            } else {
                Action::Archive
            },
        })
    }

    /// Record a decision as if carried out, so later decisions see it
    pub fn reserve(&mut self, source: &Path, decision: &PlacementDecision, fingerprint: Fingerprint) -> Result<()> {
        if decision.is_move() {
            let size = fs::metadata(source)?.len();
            self.index.record(&decision.target_path(), size, fingerprint)?;
        }
        Ok(())
    }

    /// Carry out a decision; returns the final path of the file
    pub fn execute(
        &mut self,
        source: &Path,
        decision: &PlacementDecision,
        fingerprint: Fingerprint,
    ) -> Result<PathBuf> {
        if !decision.is_move() {
            return Ok(source.to_path_buf());
        }

        let target = decision.target_path();
        let size = fs::metadata(source)?.len();
        move_no_clobber(source, &target).map_err(|e| Error::move_failed(source, &target, e))?;

        self.index.forget(source);
        self.index.record(&target, size, fingerprint)?;
        Ok(target)
    }

    /// Decide and move an incoming file
    ///
    /// A destination claimed between decision and move is re-decided.
    pub fn place(
        &mut self,
        source: &Path,
        name: &CanonicalName,
        kind: MediaKind,
        fingerprint: Fingerprint,
        handle_duplicate: bool,
    ) -> Result<(PlacementDecision, PathBuf)> {
        let mut attempt = 0;
        loop {
            let decision = self.decide(source, name, kind, fingerprint, handle_duplicate)?;
            match self.execute(source, &decision, fingerprint) {
                Err(Error::MoveFailed { source: e, .. })
                    if e.kind() == ErrorKind::AlreadyExists && attempt < self.retries =>
                {
                    warn!(?source, target = ?decision.target_path(), "Destination appeared during move, retrying");
                    self.index.invalidate(&decision.destination_root);
                    attempt += 1;
                }
                result => return result.map(|dest| (decision, dest)),
            }
        }
    }

    /// Name inside `duplicates/`: the canonical name, or with `~N` appended
    fn free_duplicate_name(&mut self, source: &Path, name: &CanonicalName) -> Result<String> {
        let dir = self.layout.duplicates().to_path_buf();
        for n in 0..=MAX_DUPLICATE_MARKER {
            let candidate = if n == 0 {
                name.file_name()
            } else {
                name.with_stem(&format!("{}~{}", name.stem(), n)).file_name()
            };
            if !self.index.is_occupied(&dir.join(&candidate))? {
                return Ok(candidate);
            }
        }

        Err(Error::PlacementExhausted {
            path: source.to_path_buf(),
            attempts: MAX_DUPLICATE_MARKER + 1,
        })
    }
}

/// Final state of one file in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Archived,
    Snapshot,
    Duplicate,
    Recovered,
    Skipped,
    Failed,
}

impl Outcome {
    pub fn of(action: &Action) -> Self {
        match action {
            Action::Archive => Outcome::Archived,
            Action::Snapshot => Outcome::Snapshot,
            Action::Duplicate { .. } => Outcome::Duplicate,
            Action::SkipUnchanged(_) => Outcome::Skipped,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Archived => "archived",
            Outcome::Snapshot => "snapshot",
            Outcome::Duplicate => "duplicate",
            Outcome::Recovered => "recovered",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
        }
    }
}

/// Result of processing a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    /// Where the file is now (`None` only for failures)
    pub destination: Option<PathBuf>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FileReport {
    pub fn placed(source: &Path, decision: &PlacementDecision, destination: PathBuf) -> Self {
        let detail = match &decision.action {
            Action::Duplicate { twin } => Some(format!("identical to {}", twin.display())),
            Action::SkipUnchanged(reason) => Some(reason.to_string()),
            _ => None,
        };
        Self {
            source: source.to_path_buf(),
            destination: Some(destination),
            outcome: Outcome::of(&decision.action),
            detail,
        }
    }

    pub fn failed(source: &Path, err: &Error) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: None,
            outcome: Outcome::Failed,
            detail: Some(err.to_string()),
        }
    }

    /// Mark a completed move as a recovery out of `duplicates/`
    pub fn recovered(mut self) -> Self {
        if matches!(self.outcome, Outcome::Archived | Outcome::Snapshot) {
            self.outcome = Outcome::Recovered;
        }
        self
    }

    /// Emit the decision to the log
    pub fn log(&self) {
        let outcome = self.outcome.label();
        match self.outcome {
            Outcome::Failed => error!(
                source = ?self.source,
                outcome,
                error = self.detail.as_deref().unwrap_or_default(),
                "File left in place"
            ),
            Outcome::Skipped => info!(
                source = ?self.source,
                outcome,
                detail = self.detail.as_deref().unwrap_or_default(),
                "File skipped"
            ),
            _ => info!(
                source = ?self.source,
                destination = ?self.destination,
                outcome,
                "File moved"
            ),
        }
    }
}

/// Per-file outcomes of one `fit` or `recover` pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    /// Stopped early on request
    pub interrupted: bool,
    /// Files discovered but not reached before an interruption
    pub pending: usize,
}

impl BatchReport {
    pub fn push(&mut self, report: FileReport) {
        report.log();
        self.files.push(report);
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.files.iter().filter(|f| f.outcome == outcome).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.outcome == Outcome::Failed)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}, Archived: {}, Snapshot: {}, Duplicates: {}, Recovered: {}, Skipped: {}, Failed: {}",
            self.files.len(),
            self.count(Outcome::Archived),
            self.count(Outcome::Snapshot),
            self.count(Outcome::Duplicate),
            self.count(Outcome::Recovered),
            self.count(Outcome::Skipped),
            self.count(Outcome::Failed)
        );
        if self.interrupted {
            summary.push_str(&format!(" (interrupted, {} pending)", self.pending));
        }
        summary
    }
}
