//! Name list used to label absentees.
//!
//! A header-less sheet where the second column holds the registration number
//! and the third the student's name. Rows whose registration does not end in
//! two digits (titles, blank lines, header-like rows) are skipped.

use std::path::PathBuf;

use async_trait::async_trait;
use rollcall_core::error::StorageError;
use rollcall_core::report::NameDirectory;
use rollcall_core::roster::normalize_registration;
use rollcall_core::store::NameSource;
use tracing::{debug, warn};

use crate::csv_sheet;

const REGISTRATION_COL: usize = 1;
const NAME_COL: usize = 2;

pub struct CsvNameList {
    path: PathBuf,
}

impl CsvNameList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn directory(rows: Vec<Vec<String>>) -> NameDirectory {
        let mut names = NameDirectory::new();
        for row in rows {
            let (Some(reg), Some(name)) = (row.get(REGISTRATION_COL), row.get(NAME_COL)) else {
                continue;
            };
            let name = name.trim();
            let Some(reg) = normalize_registration(reg) else {
                continue;
            };
            if name.is_empty() || reg.len() < 2 {
                continue;
            }
            names.insert(&reg[reg.len() - 2..], name);
        }
        names
    }
}

#[async_trait]
impl NameSource for CsvNameList {
    async fn load(&self) -> Result<NameDirectory, StorageError> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "Name list not found, using email names");
            return Ok(NameDirectory::new());
        }

        let unreadable = |reason: String| StorageError::NameListUnreadable {
            path: self.path.clone(),
            reason,
        };
        let bytes = std::fs::read(&self.path).map_err(|e| unreadable(e.to_string()))?;
        let rows = csv_sheet::parse_rows(&bytes).map_err(|e| unreadable(e.to_string()))?;

        let names = Self::directory(rows);
        debug!(path = %self.path.display(), count = names.len(), "Name list loaded");
        Ok(names)
    }
}
