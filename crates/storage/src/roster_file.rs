//! CSV-backed original roster.
//!
//! The file is read once, validated against the configured schema, and the
//! resulting roster is cached for the life of the store. A SHA-256 of the
//! raw bytes is kept alongside so callers can prove the original was never
//! rewritten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::error::StorageError;
use rollcall_core::roster::{Roster, RosterSchema};
use rollcall_core::store::RosterStore;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::csv_sheet;

struct Loaded {
    roster: Arc<Roster>,
    fingerprint: String,
}

pub struct CsvRosterStore {
    path: PathBuf,
    schema: RosterSchema,
    cache: RwLock<Option<Loaded>>,
}

impl CsvRosterStore {
    pub fn new(path: impl Into<PathBuf>, schema: RosterSchema) -> Self {
        Self {
            path: path.into(),
            schema,
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex SHA-256 of the bytes the cached roster was built from.
    pub async fn fingerprint(&self) -> Result<String, StorageError> {
        self.load().await?;
        let cache = self.cache.read().await;
        Ok(cache.as_ref().map(|l| l.fingerprint.clone()).unwrap_or_default())
    }

    /// Re-hash the file on disk and compare with the loaded fingerprint.
    pub async fn verify_unchanged(&self) -> Result<bool, StorageError> {
        let loaded = self.fingerprint().await?;
        let bytes = self.read_bytes()?;
        Ok(fingerprint(&bytes) == loaded)
    }

    /// Drop the cached roster and read the file again.
    pub async fn reload(&self) -> Result<Arc<Roster>, StorageError> {
        *self.cache.write().await = None;
        self.load().await
    }

    fn read_bytes(&self) -> Result<Vec<u8>, StorageError> {
        std::fs::read(&self.path).map_err(|e| self.unreadable(e))
    }

    fn unreadable(&self, e: impl std::fmt::Display) -> StorageError {
        StorageError::RosterUnreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl RosterStore for CsvRosterStore {
    fn name(&self) -> &str {
        "csv"
    }

    async fn load(&self) -> Result<Arc<Roster>, StorageError> {
        if let Some(loaded) = self.cache.read().await.as_ref() {
            return Ok(loaded.roster.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(loaded) = cache.as_ref() {
            return Ok(loaded.roster.clone());
        }

        let bytes = self.read_bytes()?;
        let sheet = csv_sheet::parse_sheet(&bytes).map_err(|e| self.unreadable(e))?;
        let roster = Arc::new(Roster::from_sheet(sheet, &self.schema)?);
        let fingerprint = fingerprint(&bytes);
        let short = &fingerprint[..12];

        info!(
            path = %self.path.display(),
            rows = roster.row_count(),
            fingerprint = %short,
            "Roster loaded"
        );
        debug!(schema = ?self.schema, "Roster columns resolved");

        *cache = Some(Loaded {
            roster: roster.clone(),
            fingerprint,
        });
        Ok(roster)
    }
}
