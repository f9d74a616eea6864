//! A plain rectangular sheet: one header row plus string records.
//!
//! This is the neutral shape exchanged with the storage layer. Readers and
//! writers of concrete file formats produce and consume `Sheet`s; the domain
//! types in [`crate::roster`] interpret them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self { headers, records }
    }

    /// Position of the column whose trimmed header equals `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }

    /// Cell at (`record`, `column`), or `""` for short records.
    pub fn cell(&self, record: usize, column: usize) -> &str {
        self.records
            .get(record)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
