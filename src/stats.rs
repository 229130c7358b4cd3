//! Archive inventory: per-month counts read straight from the directory tree

use crate::error::Result;
use crate::layout::ArchiveLayout;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthCounts {
    pub photos: usize,
    pub videos: usize,
}

impl MonthCounts {
    pub fn total(&self) -> usize {
        self.photos + self.videos
    }
}

/// Counts of one archive root at a point in time
///
/// Never cached: take a fresh snapshot after any placement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Keyed by `YYYYMM`, ascending
    pub months: BTreeMap<String, MonthCounts>,
    pub duplicates: usize,
    pub snapshots: usize,
}

impl StatsSnapshot {
    /// Walk `archive/`, `duplicates/` and `snapshot/`
    pub fn scan(layout: &ArchiveLayout) -> Result<Self> {
        let mut months = BTreeMap::new();

        if layout.archive().is_dir() {
            for entry in fs::read_dir(layout.archive())? {
                let entry = entry?;
                let month = entry.file_name().to_string_lossy().into_owned();
                if !entry.file_type()?.is_dir() || !is_month_key(&month) {
                    continue;
                }
                let counts = MonthCounts {
                    photos: count_files(&entry.path().join("p"))?,
                    videos: count_files(&entry.path().join("v"))?,
                };
                months.insert(month, counts);
            }
        }

        let mut snapshots = 0;
        if layout.snapshot().is_dir() {
            for entry in WalkDir::new(layout.snapshot()) {
                if entry?.file_type().is_file() {
                    snapshots += 1;
                }
            }
        }

        let snapshot = Self {
            months,
            duplicates: count_files(layout.duplicates())?,
            snapshots,
        };
        debug!(
            months = snapshot.months.len(),
            photos = snapshot.total_photos(),
            videos = snapshot.total_videos(),
            duplicates = snapshot.duplicates,
            snapshots = snapshot.snapshots,
            "Scanned archive inventory"
        );
        Ok(snapshot)
    }

    pub fn total_photos(&self) -> usize {
        self.months.values().map(|c| c.photos).sum()
    }

    pub fn total_videos(&self) -> usize {
        self.months.values().map(|c| c.videos).sum()
    }

    pub fn month(&self, key: &str) -> MonthCounts {
        self.months.get(key).copied().unwrap_or_default()
    }
}

fn is_month_key(name: &str) -> bool {
    name.len() == 6 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Regular files directly inside `dir`; a missing folder counts as empty
fn count_files(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthChange {
    /// Only in the later snapshot
    Added,
    /// Only in the earlier snapshot
    Removed,
    Changed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthDelta {
    pub month: String,
    pub change: MonthChange,
    pub before: MonthCounts,
    pub after: MonthCounts,
    pub photos: i64,
    pub videos: i64,
}

impl MonthDelta {
    pub fn total(&self) -> i64 {
        self.photos + self.videos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountDelta {
    pub before: usize,
    pub after: usize,
}

impl CountDelta {
    pub fn delta(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsDelta {
    /// Every month in either snapshot, ascending
    pub months: Vec<MonthDelta>,
    pub duplicates: CountDelta,
    pub snapshots: CountDelta,
}

impl StatsDelta {
    /// Months whose counts differ
    pub fn changes(&self) -> impl Iterator<Item = &MonthDelta> {
        self.months.iter().filter(|m| m.change != MonthChange::Unchanged)
    }

    pub fn is_empty(&self) -> bool {
        self.changes().next().is_none()
            && self.duplicates.delta() == 0
            && self.snapshots.delta() == 0
    }
}

/// Signed per-month differences between two snapshots
pub fn compare(before: &StatsSnapshot, after: &StatsSnapshot) -> StatsDelta {
    let keys: BTreeSet<&String> = before.months.keys().chain(after.months.keys()).collect();

    let months = keys
        .into_iter()
        .map(|month| {
            let old = before.months.get(month);
            let new = after.months.get(month);
            let b = old.copied().unwrap_or_default();
            let a = new.copied().unwrap_or_default();
            let change = match (old, new) {
                (None, Some(_)) => MonthChange::Added,
                (Some(_), None) => MonthChange::Removed,
                _ if a == b => MonthChange::Unchanged,
                _ => MonthChange::Changed,
            };
            MonthDelta {
                month: month.clone(),
                change,
                before: b,
                after: a,
                photos: a.photos as i64 - b.photos as i64,
                videos: a.videos as i64 - b.videos as i64,
            }
        })
        .collect();

    StatsDelta {
        months,
        duplicates: CountDelta {
            before: before.duplicates,
            after: after.duplicates,
        },
        snapshots: CountDelta {
            before: before.snapshots,
            after: after.snapshots,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MediaKind};

    fn counts(photos: usize, videos: usize) -> MonthCounts {
        MonthCounts { photos, videos }
    }

    fn snapshot(months: &[(&str, usize, usize)], duplicates: usize, snapshots: usize) -> StatsSnapshot {
        StatsSnapshot {
            months: months
                .iter()
                .map(|(m, p, v)| (m.to_string(), counts(*p, *v)))
                .collect(),
            duplicates,
            snapshots,
        }
    }

    #[test]
    fn test_scan_counts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(&Config::with_root(dir.path()));
        layout.ensure().unwrap();

        let p = layout.month_dir("202401", MediaKind::Photo);
        let v = layout.month_dir("202401", MediaKind::Video);
        fs::create_dir_all(&p).unwrap();
        fs::create_dir_all(&v).unwrap();
        fs::write(p.join("a.jpg"), b"a").unwrap();
        fs::write(p.join("b.jpg"), b"b").unwrap();
        fs::write(v.join("c.mov"), b"c").unwrap();
        fs::create_dir_all(layout.month_dir("202312", MediaKind::Photo)).unwrap();
        fs::create_dir_all(layout.archive().join("misc")).unwrap();
        fs::write(layout.archive().join("misc").join("x.jpg"), b"x").unwrap();
        fs::write(layout.duplicates().join("d.jpg"), b"d").unwrap();
        fs::create_dir_all(layout.snapshot().join("nested")).unwrap();
        fs::write(layout.snapshot().join("s.jpg"), b"s").unwrap();
        fs::write(layout.snapshot().join("nested").join("t.jpg"), b"t").unwrap();

        let stats = StatsSnapshot::scan(&layout).unwrap();
        assert_eq!(stats.months.len(), 2);
        assert_eq!(stats.month("202401"), counts(2, 1));
        assert_eq!(stats.month("202312"), counts(0, 0));
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.snapshots, 2);
        assert_eq!(stats.total_photos(), 2);
        assert_eq!(stats.months.keys().next().unwrap(), "202312");
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_reports_unreadable_snapshot_folder() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(&Config::with_root(dir.path()));
        layout.ensure().unwrap();
        let locked = layout.snapshot().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("s.jpg"), b"s").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through the mode bits
        let readable = fs::read_dir(&locked).is_ok();
        let result = StatsSnapshot::scan(&layout);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            assert_eq!(result.unwrap().snapshots, 1);
        } else {
            assert!(matches!(result, Err(crate::error::Error::WalkDir(_))));
        }
    }

    #[test]
    fn test_scan_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(&Config::with_root(dir.path()));
        assert_eq!(StatsSnapshot::scan(&layout).unwrap(), StatsSnapshot::default());
    }

    #[test]
    fn test_new_month_is_full_addition() {
        let before = snapshot(&[("202401", 3, 1)], 0, 0);
        let after = snapshot(&[("202401", 3, 1), ("202402", 5, 2)], 0, 0);

        let delta = compare(&before, &after);
        let added = &delta.months[1];
        assert_eq!(added.month, "202402");
        assert_eq!(added.change, MonthChange::Added);
        assert_eq!((added.photos, added.videos, added.total()), (5, 2, 7));
        assert_eq!(delta.months[0].change, MonthChange::Unchanged);
        assert_eq!(delta.changes().count(), 1);
    }

    #[test]
    fn test_removed_and_changed_months() {
        let before = snapshot(&[("202301", 2, 0), ("202401", 3, 1)], 4, 1);
        let after = snapshot(&[("202401", 1, 4)], 2, 3);

        let delta = compare(&before, &after);
        assert_eq!(delta.months[0].change, MonthChange::Removed);
        assert_eq!(delta.months[0].photos, -2);
        assert_eq!(delta.months[1].change, MonthChange::Changed);
        assert_eq!((delta.months[1].photos, delta.months[1].videos), (-2, 3));
        assert_eq!(delta.duplicates.delta(), -2);
        assert_eq!(delta.snapshots.delta(), 2);
    }

    #[test]
    fn test_identical_snapshots() {
        let s = snapshot(&[("202401", 3, 1)], 1, 1);
        assert!(compare(&s, &s).is_empty());
    }
}
