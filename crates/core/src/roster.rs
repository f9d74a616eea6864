//! The original attendance roster.
//!
//! A [`Roster`] is built once from the original sheet and never mutated
//! afterwards. Column positions are resolved against a fixed
//! [`RosterSchema`] at load time, so a sheet missing an expected column fails
//! here with a [`StorageError`] instead of deep inside the matcher.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::sheet::Sheet;

/// Attendance status of a single row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Present,
    Absent,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "PRESENT",
            Status::Absent => "ABSENT",
        }
    }

    /// Interpret a status cell. Only `ABSENT` (any case) is absent.
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().eq_ignore_ascii_case("absent") {
            Status::Absent
        } else {
            Status::Present
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student row. `row_index` is 1-based and excludes the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub row_index: usize,
    pub registration_number: String,
    pub identity: String,
    pub status: Status,
}

impl RosterRow {
    /// The last two characters of the registration number.
    pub fn suffix(&self) -> &str {
        let reg = &self.registration_number;
        &reg[reg.len().saturating_sub(2)..]
    }
}

/// Header names of the columns the roster must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSchema {
    pub registration_column: String,
    pub identity_column: String,
    pub status_column: String,
}

impl Default for RosterSchema {
    fn default() -> Self {
        Self {
            registration_column: "Registration Id".into(),
            identity_column: "Email Id".into(),
            status_column: "Attendance *".into(),
        }
    }
}

/// Resolved column positions within the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub registration: usize,
    pub identity: usize,
    pub status: usize,
}

impl Columns {
    pub fn resolve(sheet: &Sheet, schema: &RosterSchema) -> Result<Self, StorageError> {
        let find = |name: &str| {
            sheet.column(name).ok_or_else(|| StorageError::MissingColumn {
                column: name.to_string(),
            })
        };
        Ok(Self {
            registration: find(&schema.registration_column)?,
            identity: find(&schema.identity_column)?,
            status: find(&schema.status_column)?,
        })
    }
}

/// Normalize a registration cell: trim, drop a trailing `.0` left behind by
/// float-typed spreadsheet cells, and require decimal digits only.
pub fn normalize_registration(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// The immutable original roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    sheet: Sheet,
    columns: Columns,
    rows: Vec<RosterRow>,
}

impl Roster {
    /// Validate `sheet` against `schema` and build the roster.
    ///
    /// Fully blank records are dropped. Every row of the original is
    /// considered PRESENT regardless of what its status cell holds.
    pub fn from_sheet(sheet: Sheet, schema: &RosterSchema) -> Result<Self, StorageError> {
        let columns = Columns::resolve(&sheet, schema)?;

        let Sheet { headers, records } = sheet;
        let records: Vec<Vec<String>> = records
            .into_iter()
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let row_index = i + 1;
            let raw = record.get(columns.registration).map(String::as_str).unwrap_or("");
            let registration_number =
                normalize_registration(raw).ok_or_else(|| StorageError::InvalidRow {
                    row: row_index,
                    reason: format!("registration number '{}' is not numeric", raw.trim()),
                })?;
            let identity = record
                .get(columns.identity)
                .map(|c| c.trim().to_string())
                .unwrap_or_default();
            rows.push(RosterRow {
                row_index,
                registration_number,
                identity,
                status: Status::Present,
            });
        }

        Ok(Self {
            sheet: Sheet { headers, records },
            columns,
            rows,
        })
    }

    pub fn rows(&self) -> &[RosterRow] {
        &self.rows
    }

    /// Row by 1-based index.
    pub fn row(&self, row_index: usize) -> Option<&RosterRow> {
        row_index.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }
}
