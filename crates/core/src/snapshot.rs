//! Working snapshots: a mutable status column over an immutable roster.
//!
//! A snapshot shares the original [`Roster`] through an `Arc` and owns only
//! its own status vector, so row identities can never drift from the source
//! and the original rows are never touched.

use std::sync::Arc;

use crate::error::StorageError;
use crate::roster::{normalize_registration, Roster, RosterRow, Status};
use crate::sheet::Sheet;

/// Effect of marking one row absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// PRESENT -> ABSENT.
    Marked,
    /// Row was already ABSENT; nothing changed.
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSnapshot {
    roster: Arc<Roster>,
    statuses: Vec<Status>,
}

impl WorkingSnapshot {
    /// A fresh snapshot with every row PRESENT.
    pub fn fresh(roster: Arc<Roster>) -> Self {
        let statuses = vec![Status::Present; roster.row_count()];
        Self { roster, statuses }
    }

    /// Rebuild a snapshot from a previously exported artifact.
    ///
    /// The artifact must list exactly the roster's registration numbers in
    /// the same order; only the status column is taken from it.
    pub fn reopen(roster: Arc<Roster>, artifact: &Sheet) -> Result<Self, StorageError> {
        let headers = &roster.sheet().headers;
        let columns = roster.columns();
        let find = |original: usize| {
            let name = &headers[original];
            artifact
                .column(name)
                .ok_or_else(|| StorageError::ArtifactMismatch(format!("column '{name}' is missing")))
        };
        let reg_col = find(columns.registration)?;
        let status_col = find(columns.status)?;

        let records: Vec<&Vec<String>> = artifact
            .records
            .iter()
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .collect();
        if records.len() != roster.row_count() {
            return Err(StorageError::ArtifactMismatch(format!(
                "artifact has {} rows, roster has {}",
                records.len(),
                roster.row_count()
            )));
        }

        let mut statuses = Vec::with_capacity(records.len());
        for (record, row) in records.iter().zip(roster.rows()) {
            let cell = record.get(reg_col).map(String::as_str).unwrap_or("");
            if normalize_registration(cell).as_deref() != Some(row.registration_number.as_str()) {
                return Err(StorageError::ArtifactMismatch(format!(
                    "row {} is '{}' in the artifact but '{}' in the roster",
                    row.row_index,
                    cell.trim(),
                    row.registration_number
                )));
            }
            let status = record.get(status_col).map(String::as_str).unwrap_or("");
            statuses.push(Status::from_cell(status));
        }

        Ok(Self { roster, statuses })
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn status(&self, row_index: usize) -> Option<Status> {
        row_index.checked_sub(1).and_then(|i| self.statuses.get(i)).copied()
    }

    /// Row by 1-based index, carrying this snapshot's status.
    pub fn row(&self, row_index: usize) -> Option<RosterRow> {
        let status = self.status(row_index)?;
        self.roster.row(row_index).map(|r| RosterRow {
            status,
            ..r.clone()
        })
    }

    /// All rows in `row_index` order with their current status.
    pub fn rows(&self) -> Vec<RosterRow> {
        self.roster
            .rows()
            .iter()
            .zip(&self.statuses)
            .map(|(r, s)| RosterRow {
                status: *s,
                ..r.clone()
            })
            .collect()
    }

    pub fn absent_rows(&self) -> Vec<RosterRow> {
        self.rows()
            .into_iter()
            .filter(|r| r.status == Status::Absent)
            .collect()
    }

    pub fn absent_count(&self) -> usize {
        self.statuses.iter().filter(|s| **s == Status::Absent).count()
    }

    /// Mark a row absent. ABSENT rows are never changed back.
    ///
    /// Returns `None` for an index outside the roster.
    pub fn mark_absent(&mut self, row_index: usize) -> Option<Transition> {
        let slot = row_index
            .checked_sub(1)
            .and_then(|i| self.statuses.get_mut(i))?;
        match slot {
            Status::Absent => Some(Transition::AlreadyAbsent),
            Status::Present => {
                *slot = Status::Absent;
                Some(Transition::Marked)
            }
        }
    }

    /// The original sheet with the status column rewritten from this snapshot.
    pub fn to_sheet(&self) -> Sheet {
        let mut sheet = self.roster.sheet().clone();
        let col = self.roster.columns().status;
        for (record, status) in sheet.records.iter_mut().zip(&self.statuses) {
            if record.len() <= col {
                record.resize(col + 1, String::new());
            }
            record[col] = status.as_str().to_string();
        }
        sheet
    }
}
