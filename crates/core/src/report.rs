//! Absentee report built from a working snapshot.
//!
//! Lists every ABSENT row as `(suffix, name)`, sorted by suffix. Names come
//! from an optional [`NameDirectory`]; rows without an entry fall back to the
//! local part of their email address.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::snapshot::WorkingSnapshot;

/// Two-digit suffix -> display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDirectory {
    names: HashMap<String, String>,
}

impl NameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, suffix: impl Into<String>, name: impl Into<String>) {
        self.names.insert(suffix.into(), name.into());
    }

    pub fn get(&self, suffix: &str) -> Option<&str> {
        self.names.get(suffix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for NameDirectory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Half of the teaching day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sitting {
    /// Forenoon, before 13:00.
    #[serde(rename = "FN")]
    Forenoon,
    /// Afternoon, from 13:00.
    #[serde(rename = "AN")]
    Afternoon,
}

impl Sitting {
    pub fn at(time: &NaiveDateTime) -> Self {
        if time.hour() < 13 {
            Sitting::Forenoon
        } else {
            Sitting::Afternoon
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sitting::Forenoon => "FN",
            Sitting::Afternoon => "AN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absentee {
    pub suffix: String,
    pub name: String,
    pub row_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenteeReport {
    pub date: NaiveDate,
    pub sitting: Sitting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub absentees: Vec<Absentee>,
}

impl AbsenteeReport {
    pub fn build(
        snapshot: &WorkingSnapshot,
        names: &NameDirectory,
        class_name: Option<&str>,
        now: NaiveDateTime,
    ) -> Self {
        let mut absentees: Vec<Absentee> = snapshot
            .absent_rows()
            .into_iter()
            .map(|row| {
                let suffix = row.suffix().to_string();
                let name = names
                    .get(&suffix)
                    .map(str::to_string)
                    .unwrap_or_else(|| email_name(&row.identity).to_string());
                Absentee {
                    suffix,
                    name,
                    row_index: row.row_index,
                }
            })
            .collect();
        absentees.sort_by(|a, b| a.suffix.cmp(&b.suffix).then(a.row_index.cmp(&b.row_index)));

        Self {
            date: now.date(),
            sitting: Sitting::at(&now),
            class_name: class_name.map(str::to_string),
            absentees,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.absentees.is_empty()
    }
}

fn email_name(identity: &str) -> &str {
    identity.split('@').next().unwrap_or(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Roster, RosterSchema};
    use crate::sheet::Sheet;
    use std::sync::Arc;

    fn snapshot() -> WorkingSnapshot {
        let sheet = Sheet::new(
            vec![
                "Registration Id".into(),
                "Email Id".into(),
                "Attendance *".into(),
            ],
            vec![
                vec!["2403021".into(), "zed.k@x.edu".into(), "".into()],
                vec!["2403004".into(), "amy.r@x.edu".into(), "".into()],
                vec!["2403010".into(), "raj.p@x.edu".into(), "".into()],
            ],
        );
        let roster = Arc::new(Roster::from_sheet(sheet, &RosterSchema::default()).unwrap());
        WorkingSnapshot::fresh(roster)
    }

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 9)
            .unwrap()
            .and_hms_opt(h, 15, 0)
            .unwrap()
    }

    #[test]
    fn sorted_by_suffix_with_name_fallback() {
        let mut snap = snapshot();
        snap.mark_absent(1);
        snap.mark_absent(2);
        let mut names = NameDirectory::new();
        names.insert("04", "AMY ROSE");

        let report = AbsenteeReport::build(&snap, &names, Some("II M Tech CSE"), at(9));
        let got: Vec<(&str, &str)> = report
            .absentees
            .iter()
            .map(|a| (a.suffix.as_str(), a.name.as_str()))
            .collect();
        assert_eq!(got, vec![("04", "AMY ROSE"), ("21", "zed.k")]);
        assert_eq!(report.sitting, Sitting::Forenoon);
        assert_eq!(report.class_name.as_deref(), Some("II M Tech CSE"));
    }

    #[test]
    fn afternoon_starts_at_thirteen() {
        assert_eq!(Sitting::at(&at(12)), Sitting::Forenoon);
        assert_eq!(Sitting::at(&at(13)), Sitting::Afternoon);
        assert_eq!(Sitting::Afternoon.code(), "AN");
    }

    #[test]
    fn no_absentees_means_empty_report() {
        let report = AbsenteeReport::build(&snapshot(), &NameDirectory::new(), None, at(10));
        assert!(report.is_empty());
    }
}
