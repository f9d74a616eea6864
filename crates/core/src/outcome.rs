//! Structured results handed back to transports.
//!
//! Nothing in here formats user-facing text; transports render these.

use serde::{Deserialize, Serialize};

use crate::matcher::{MalformedToken, Suffix};
use crate::report::AbsenteeReport;
use crate::roster::RosterRow;
use crate::session::{SessionId, SessionMode};
use crate::store::ArtifactHandle;

/// A suffix that matched more than one row. No row was changed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousMatch {
    pub suffix: Suffix,
    pub rows: Vec<RosterRow>,
}

/// Outcome of applying one batch of suffixes to a snapshot.
///
/// `updated` and `already_absent` are in ascending `row_index` order, not
/// in the order the suffixes were typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Rows moved PRESENT -> ABSENT, in their post-mutation state.
    pub updated: Vec<RosterRow>,
    pub already_absent: Vec<RosterRow>,
    /// Tokens, as typed, that matched no row. Ambiguous suffixes go to `ambiguous`, not here.
    pub not_found: Vec<String>,
    pub ambiguous: Vec<AmbiguousMatch>,
    pub malformed: Vec<MalformedToken>,
}

impl UpdateResult {
    /// Whether the snapshot changed.
    pub fn changed(&self) -> bool {
        !self.updated.is_empty()
    }

    /// Input for which nothing was applied: not-found tokens as typed, then
    /// ambiguous suffixes.
    pub fn unapplied_suffixes(&self) -> Vec<&str> {
        self.not_found
            .iter()
            .map(String::as_str)
            .chain(self.ambiguous.iter().map(|a| a.suffix.as_str()))
            .collect()
    }
}

/// Why a CONTINUE request was served as NEW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeFallback {
    /// The requester has no exported snapshot to continue from.
    NoPriorArtifact,
}

/// Result of a mode selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeOutcome {
    pub session_id: SessionId,
    pub requested: SessionMode,
    /// The mode actually in effect (`New` after a fallback).
    pub effective: SessionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ModeFallback>,
    pub artifact: ArtifactHandle,
    pub rows: usize,
    pub absent: usize,
}

/// Result of one text submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub result: UpdateResult,
    /// Artifact reflecting the committed snapshot.
    pub artifact: ArtifactHandle,
    /// Whether `artifact` was written by this submission.
    pub exported: bool,
    pub report: AbsenteeReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Status;

    #[test]
    fn unapplied_lists_not_found_then_ambiguous() {
        let result = UpdateResult {
            not_found: vec!["9".into()],
            ambiguous: vec![AmbiguousMatch {
                suffix: Suffix::parse("11").unwrap(),
                rows: vec![],
            }],
            ..Default::default()
        };
        assert_eq!(result.unapplied_suffixes(), vec!["9", "11"]);
        assert!(!result.changed());
    }

    #[test]
    fn changed_when_rows_updated() {
        let result = UpdateResult {
            updated: vec![RosterRow {
                row_index: 1,
                registration_number: "2403001".into(),
                identity: "a@x.edu".into(),
                status: Status::Absent,
            }],
            ..Default::default()
        };
        assert!(result.changed());
    }
}
