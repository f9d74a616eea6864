//! Applying an [`UpdatePlan`] to a working snapshot.

use std::collections::BTreeSet;

use rollcall_core::matcher::{Resolution, UpdatePlan};
use rollcall_core::outcome::{AmbiguousMatch, UpdateResult};
use rollcall_core::snapshot::{Transition, WorkingSnapshot};

/// Mark every uniquely resolved row absent.
///
/// Rows are visited in ascending `row_index`, so `updated` and
/// `already_absent` come out sorted regardless of how the suffixes were
/// typed. Ambiguous suffixes change nothing.
pub fn apply_plan(snapshot: &mut WorkingSnapshot, plan: UpdatePlan) -> UpdateResult {
    let mut result = UpdateResult {
        malformed: plan.malformed,
        ..Default::default()
    };
    let mut targets = BTreeSet::new();

    for entry in plan.entries {
        match entry.resolution() {
            Resolution::NotFound => result.not_found.push(entry.typed),
            Resolution::Resolved(row) => {
                targets.insert(row.row_index);
            }
            Resolution::Ambiguous(_) => result.ambiguous.push(AmbiguousMatch {
                suffix: entry.suffix,
                rows: entry.matches,
            }),
        }
    }

    for row_index in targets {
        let transition = snapshot.mark_absent(row_index);
        let Some(row) = snapshot.row(row_index) else {
            continue;
        };
        match transition {
            Some(Transition::Marked) => result.updated.push(row),
            Some(Transition::AlreadyAbsent) => result.already_absent.push(row),
            None => {}
        }
    }

    result
}
