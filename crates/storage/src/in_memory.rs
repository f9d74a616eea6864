//! In-memory stores: useful for testing and dry runs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rollcall_core::error::StorageError;
use rollcall_core::roster::{Roster, RosterSchema};
use rollcall_core::session::RequesterId;
use rollcall_core::sheet::Sheet;
use rollcall_core::snapshot::WorkingSnapshot;
use rollcall_core::store::{ArtifactHandle, RosterStore, SnapshotArchive};
use tokio::sync::RwLock;

use crate::archive::lineage_key;

/// A roster held in memory, or a configured load failure.
pub struct InMemoryRosterStore {
    roster: Result<Arc<Roster>, StorageError>,
}

impl InMemoryRosterStore {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster: Ok(Arc::new(roster)),
        }
    }

    pub fn from_sheet(sheet: Sheet, schema: &RosterSchema) -> Result<Self, StorageError> {
        Ok(Self::new(Roster::from_sheet(sheet, schema)?))
    }

    /// A store whose every load fails.
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self {
            roster: Err(StorageError::RosterUnreadable {
                path: PathBuf::from("memory"),
                reason: reason.into(),
            }),
        }
    }
}

#[async_trait]
impl RosterStore for InMemoryRosterStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self) -> Result<Arc<Roster>, StorageError> {
        self.roster.clone()
    }
}

/// Archive keeping every exported sheet in memory.
#[derive(Default)]
pub struct InMemoryArchive {
    lineages: RwLock<HashMap<String, Vec<(ArtifactHandle, Sheet)>>>,
    fail_exports: AtomicBool,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent exports fail (or succeed again).
    pub fn set_fail_exports(&self, fail: bool) {
        self.fail_exports.store(fail, Ordering::SeqCst);
    }

    /// Number of artifacts exported for `lineage`.
    pub async fn export_count(&self, lineage: &RequesterId) -> usize {
        self.lineages
            .read()
            .await
            .get(&lineage_key(lineage))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotArchive for InMemoryArchive {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn export(
        &self,
        lineage: &RequesterId,
        snapshot: &WorkingSnapshot,
    ) -> Result<ArtifactHandle, StorageError> {
        if self.fail_exports.load(Ordering::SeqCst) {
            return Err(StorageError::ArtifactUnwritable {
                path: PathBuf::from("memory"),
                reason: "exports disabled".into(),
            });
        }

        let key = lineage_key(lineage);
        let mut lineages = self.lineages.write().await;
        let versions = lineages.entry(key.clone()).or_default();
        let handle = ArtifactHandle {
            lineage: key,
            version: versions.len() as u64 + 1,
            path: None,
            created_at: Utc::now(),
        };
        versions.push((handle.clone(), snapshot.to_sheet()));
        Ok(handle)
    }

    async fn latest(&self, lineage: &RequesterId) -> Result<Option<ArtifactHandle>, StorageError> {
        Ok(self
            .lineages
            .read()
            .await
            .get(&lineage_key(lineage))
            .and_then(|v| v.last())
            .map(|(h, _)| h.clone()))
    }

    async fn open(&self, handle: &ArtifactHandle) -> Result<Sheet, StorageError> {
        self.lineages
            .read()
            .await
            .get(&handle.lineage)
            .and_then(|v| v.iter().find(|(h, _)| h.version == handle.version))
            .map(|(_, sheet)| sheet.clone())
            .ok_or_else(|| StorageError::ArtifactUnreadable {
                path: PathBuf::from("memory"),
                reason: format!("no version {} in lineage {}", handle.version, handle.lineage),
            })
    }
}
