//! Storage traits: where rosters come from and where snapshots go.
//!
//! Implementations live in `rollcall-storage`. The controller only ever sees
//! these traits, so tests can swap in in-memory stores.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::report::NameDirectory;
use crate::roster::Roster;
use crate::session::RequesterId;
use crate::sheet::Sheet;
use crate::snapshot::WorkingSnapshot;

/// Reference to one exported snapshot artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// Lineage key the artifact belongs to (the sanitized requester).
    pub lineage: String,
    /// Monotonic version within the lineage, starting at 1.
    pub version: u64,
    /// On-disk location, when the archive is file-backed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

/// Read-only access to the original roster.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Human-readable backend name (e.g. "csv", "in_memory").
    fn name(&self) -> &str;

    /// Load the roster. Implementations may cache the result; the returned
    /// roster is immutable either way.
    async fn load(&self) -> Result<Arc<Roster>, StorageError>;

    async fn row_count(&self) -> Result<usize, StorageError> {
        Ok(self.load().await?.row_count())
    }
}

/// Versioned store of exported working snapshots.
///
/// `export` must never write to the original roster's resource, must write
/// every row in `row_index` order, and must not depend on earlier artifacts
/// existing.
#[async_trait]
pub trait SnapshotArchive: Send + Sync {
    fn name(&self) -> &str;

    /// Write `snapshot` as the next version of `lineage`.
    async fn export(
        &self,
        lineage: &RequesterId,
        snapshot: &WorkingSnapshot,
    ) -> Result<ArtifactHandle, StorageError>;

    /// The highest-versioned artifact of `lineage`, if any.
    async fn latest(&self, lineage: &RequesterId) -> Result<Option<ArtifactHandle>, StorageError>;

    /// Read an artifact back as a sheet.
    async fn open(&self, handle: &ArtifactHandle) -> Result<Sheet, StorageError>;
}

/// Source of display names for the absentee report.
#[async_trait]
pub trait NameSource: Send + Sync {
    async fn load(&self) -> Result<NameDirectory, StorageError>;
}

/// A name source with no entries; the report falls back to email names.
pub struct NoNames;

#[async_trait]
impl NameSource for NoNames {
    async fn load(&self) -> Result<NameDirectory, StorageError> {
        Ok(NameDirectory::default())
    }
}
