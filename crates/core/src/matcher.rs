//! Registration-suffix matcher.
//!
//! Operator text such as `"1, 3,05"` is split on commas into tokens, each
//! token is normalized to a two-digit [`Suffix`], and every suffix is
//! resolved against the snapshot's rows by `ends_with`. Matching is pure and
//! deterministic: the same text against the same rows always yields the same
//! [`UpdatePlan`].

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::roster::RosterRow;

/// A normalized two-digit registration ending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suffix(String);

impl Suffix {
    /// Parse one trimmed token. `"1"` becomes `"01"`; anything that is not
    /// one or two ASCII digits is malformed.
    pub fn parse(token: &str) -> Result<Self, MalformedReason> {
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedReason::NotNumeric);
        }
        match token.len() {
            1 => Ok(Self(format!("0{token}"))),
            2 => Ok(Self(token.to_string())),
            n => Err(MalformedReason::Length(n)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "len", rename_all = "snake_case")]
pub enum MalformedReason {
    NotNumeric,
    Length(usize),
}

/// A token that could not be turned into a suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedToken {
    pub token: String,
    pub reason: MalformedReason,
}

/// A suffix and the token it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedSuffix {
    pub suffix: Suffix,
    /// The trimmed token as typed, e.g. `"9"` for suffix `"09"`.
    pub typed: String,
}

/// Tokenized operator input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInput {
    /// Distinct suffixes in the order they were first typed. A repeat keeps
    /// the first spelling.
    pub suffixes: Vec<TypedSuffix>,
    pub malformed: Vec<MalformedToken>,
}

/// Split on commas, trim, drop empty tokens, normalize the rest.
///
/// Fails only when no non-empty token remains.
pub fn parse_input(raw: &str) -> Result<ParsedInput, InputError> {
    let mut parsed = ParsedInput::default();
    let mut seen_any = false;

    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        seen_any = true;
        match Suffix::parse(token) {
            Ok(suffix) => {
                if !parsed.suffixes.iter().any(|s| s.suffix == suffix) {
                    parsed.suffixes.push(TypedSuffix {
                        suffix,
                        typed: token.to_string(),
                    });
                }
            }
            Err(reason) => parsed.malformed.push(MalformedToken {
                token: token.to_string(),
                reason,
            }),
        }
    }

    if seen_any {
        Ok(parsed)
    } else {
        Err(InputError::Empty)
    }
}

/// How a suffix resolved against the candidate rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    NotFound,
    Resolved(&'a RosterRow),
    Ambiguous(&'a [RosterRow]),
}

/// One input suffix and every row whose registration ends with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub suffix: Suffix,
    pub typed: String,
    pub matches: Vec<RosterRow>,
}

impl PlanEntry {
    pub fn resolution(&self) -> Resolution<'_> {
        match self.matches.as_slice() {
            [] => Resolution::NotFound,
            [row] => Resolution::Resolved(row),
            rows => Resolution::Ambiguous(rows),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    pub entries: Vec<PlanEntry>,
    pub malformed: Vec<MalformedToken>,
}

/// Resolve parsed suffixes against `candidates` (snapshot rows in
/// `row_index` order). Multiple matches are all kept.
pub fn resolve(parsed: ParsedInput, candidates: &[RosterRow]) -> UpdatePlan {
    let entries = parsed
        .suffixes
        .into_iter()
        .map(|TypedSuffix { suffix, typed }| {
            let matches = candidates
                .iter()
                .filter(|row| row.registration_number.ends_with(suffix.as_str()))
                .cloned()
                .collect();
            PlanEntry {
                suffix,
                typed,
                matches,
            }
        })
        .collect();

    UpdatePlan {
        entries,
        malformed: parsed.malformed,
    }
}

/// Parse `raw_text` and resolve it against `candidates` in one step.
pub fn match_suffixes(raw_text: &str, candidates: &[RosterRow]) -> Result<UpdatePlan, InputError> {
    Ok(resolve(parse_input(raw_text)?, candidates))
}
