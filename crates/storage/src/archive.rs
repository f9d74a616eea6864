//! File-backed snapshot archive.
//!
//! Layout: `<root>/<lineage>/<stem>-<version:06>.csv`, one lineage directory
//! per requester. The latest artifact is the one with the highest parsed
//! version number, independent of directory listing order or timestamps.
//! Versions beyond `keep` are pruned oldest first after each export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::error::StorageError;
use rollcall_core::session::RequesterId;
use rollcall_core::sheet::Sheet;
use rollcall_core::snapshot::WorkingSnapshot;
use rollcall_core::store::{ArtifactHandle, SnapshotArchive};
use tracing::{debug, info, warn};

use crate::csv_sheet;

pub struct FileSnapshotArchive {
    root: PathBuf,
    file_stem: String,
    keep: usize,
    /// The original roster; never a valid export target.
    original: Option<PathBuf>,
}

impl FileSnapshotArchive {
    pub fn new(root: impl Into<PathBuf>, file_stem: impl Into<String>, keep: usize) -> Self {
        Self {
            root: root.into(),
            file_stem: file_stem.into(),
            keep: keep.max(1),
            original: None,
        }
    }

    /// Refuse exports that would land on `path`.
    pub fn protecting(mut self, path: impl Into<PathBuf>) -> Self {
        self.original = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one requester's artifacts.
    pub fn lineage_dir(&self, lineage: &RequesterId) -> PathBuf {
        self.root.join(lineage_key(lineage))
    }

    /// All versions in a lineage, ascending.
    fn versions(&self, dir: &Path) -> Result<Vec<(u64, PathBuf)>, StorageError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ArtifactUnreadable {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let mut versions: Vec<(u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let version = self.parse_version(name.to_str()?)?;
                Some((version, entry.path()))
            })
            .collect();
        versions.sort_by_key(|(v, _)| *v);
        Ok(versions)
    }

    fn parse_version(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(&self.file_stem)?.strip_prefix('-')?;
        let digits = rest.strip_suffix(".csv")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn file_name(&self, version: u64) -> String {
        format!("{}-{version:06}.csv", self.file_stem)
    }

    fn is_original(&self, target: &Path) -> bool {
        let Some(original) = &self.original else {
            return false;
        };
        if target == original {
            return true;
        }
        let (Ok(original), Some(parent), Some(name)) =
            (original.canonicalize(), target.parent(), target.file_name())
        else {
            return false;
        };
        parent
            .canonicalize()
            .map(|p| p.join(name) == original)
            .unwrap_or(false)
    }

    fn prune(&self, versions: &[(u64, PathBuf)]) {
        if versions.len() <= self.keep {
            return;
        }
        for (version, path) in &versions[..versions.len() - self.keep] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(version, path = %path.display(), "Pruned old artifact"),
                Err(e) => warn!(version, error = %e, "Failed to prune artifact"),
            }
        }
    }
}

/// Filesystem-safe lineage key for a requester.
pub fn lineage_key(requester: &RequesterId) -> String {
    requester
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl SnapshotArchive for FileSnapshotArchive {
    fn name(&self) -> &str {
        "file"
    }

    async fn export(
        &self,
        lineage: &RequesterId,
        snapshot: &WorkingSnapshot,
    ) -> Result<ArtifactHandle, StorageError> {
        let dir = self.lineage_dir(lineage);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::ArtifactUnwritable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        let mut versions = self.versions(&dir)?;
        let version = versions.last().map(|(v, _)| v + 1).unwrap_or(1);
        let path = dir.join(self.file_name(version));
        if self.is_original(&path) {
            return Err(StorageError::WouldOverwriteOriginal(path));
        }

        csv_sheet::write_sheet_atomic(&path, &snapshot.to_sheet()).map_err(|e| {
            StorageError::ArtifactUnwritable {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(
            lineage = %lineage,
            version,
            absent = snapshot.absent_count(),
            path = %path.display(),
            "Snapshot exported"
        );

        versions.push((version, path.clone()));
        self.prune(&versions);

        Ok(ArtifactHandle {
            lineage: lineage_key(lineage),
            version,
            path: Some(path),
            created_at: Utc::now(),
        })
    }

    async fn latest(&self, lineage: &RequesterId) -> Result<Option<ArtifactHandle>, StorageError> {
        let versions = self.versions(&self.lineage_dir(lineage))?;
        Ok(versions.into_iter().last().map(|(version, path)| ArtifactHandle {
            lineage: lineage_key(lineage),
            version,
            created_at: modified_at(&path),
            path: Some(path),
        }))
    }

    async fn open(&self, handle: &ArtifactHandle) -> Result<Sheet, StorageError> {
        let path = handle
            .path
            .clone()
            .unwrap_or_else(|| self.root.join(&handle.lineage).join(self.file_name(handle.version)));
        let unreadable = |reason: String| StorageError::ArtifactUnreadable {
            path: path.clone(),
            reason,
        };
        let bytes = std::fs::read(&path).map_err(|e| unreadable(e.to_string()))?;
        csv_sheet::parse_sheet(&bytes).map_err(|e| unreadable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::roster::{Roster, RosterSchema};
    use std::sync::Arc;

    fn snapshot() -> WorkingSnapshot {
        let sheet = Sheet::new(
            vec![
                "Registration Id".into(),
                "Email Id".into(),
                "Attendance *".into(),
            ],
            vec![
                vec!["2403001".into(), "a@x.edu".into(), "PRESENT".into()],
                vec!["2403002".into(), "b@x.edu".into(), "PRESENT".into()],
            ],
        );
        WorkingSnapshot::fresh(Arc::new(
            Roster::from_sheet(sheet, &RosterSchema::default()).unwrap(),
        ))
    }

    fn requester() -> RequesterId {
        RequesterId::scoped("telegram", "42")
    }

    #[test]
    fn lineage_keys_are_path_safe() {
        assert_eq!(lineage_key(&requester()), "telegram_42");
        assert_eq!(lineage_key(&RequesterId("../etc".into())), "___etc");
    }

    #[tokio::test]
    async fn versions_increase_and_latest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileSnapshotArchive::new(dir.path(), "attendance", 10);
        assert!(archive.latest(&requester()).await.unwrap().is_none());

        let mut snap = snapshot();
        let first = archive.export(&requester(), &snap).await.unwrap();
        snap.mark_absent(2);
        let second = archive.export(&requester(), &snap).await.unwrap();
        assert_eq!((first.version, second.version), (1, 2));

        let latest = archive.latest(&requester()).await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        let sheet = archive.open(&latest).await.unwrap();
        assert_eq!(sheet.cell(1, 2), "ABSENT");
        assert!(
            latest
                .path
                .unwrap()
                .ends_with("telegram_42/attendance-000002.csv")
        );
    }

    #[tokio::test]
    async fn latest_ignores_foreign_files_and_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileSnapshotArchive::new(dir.path(), "attendance", 10);
        let lineage_dir = archive.lineage_dir(&requester());
        std::fs::create_dir_all(&lineage_dir).unwrap();
        for name in [
            "attendance-000009.csv",
            "attendance-000010.csv",
            "attendance-zzz.csv",
            "notes.csv",
            "attendance-000099.csv.tmp",
        ] {
            std::fs::write(lineage_dir.join(name), "x\n").unwrap();
        }
        let latest = archive.latest(&requester()).await.unwrap().unwrap();
        assert_eq!(latest.version, 10);
    }

    #[tokio::test]
    async fn lineages_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileSnapshotArchive::new(dir.path(), "attendance", 10);
        archive.export(&requester(), &snapshot()).await.unwrap();
        let other = RequesterId::scoped("telegram", "7");
        assert!(archive.latest(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prunes_beyond_keep() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileSnapshotArchive::new(dir.path(), "attendance", 2);
        for _ in 0..4 {
            archive.export(&requester(), &snapshot()).await.unwrap();
        }
        let remaining = archive.versions(&archive.lineage_dir(&requester())).unwrap();
        let kept: Vec<u64> = remaining.iter().map(|(v, _)| *v).collect();
        assert_eq!(kept, vec![3, 4]);
    }

    #[tokio::test]
    async fn refuses_to_overwrite_original() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileSnapshotArchive::new(dir.path(), "attendance", 5);
        let first = archive.export(&requester(), &snapshot()).await.unwrap();
        let first_path = first.path.unwrap();

        // the next version would land exactly on the protected file
        let protected = archive.lineage_dir(&requester()).join("attendance-000002.csv");
        let archive = archive.protecting(&protected);
        let err = archive.export(&requester(), &snapshot()).await.unwrap_err();
        assert!(matches!(err, StorageError::WouldOverwriteOriginal(_)));
        assert!(!protected.exists());
        assert!(first_path.exists());
    }

    #[tokio::test]
    async fn unwritable_root_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let archive = FileSnapshotArchive::new(&blocker, "attendance", 5);
        let err = archive.export(&requester(), &snapshot()).await.unwrap_err();
        assert!(matches!(err, StorageError::ArtifactUnwritable { .. }));
    }
}
