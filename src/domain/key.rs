//! Natural key of a timesheet line

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a timesheet line: work date, employee and project
///
/// `employee` and `project` are stored trimmed and lower-cased so that
/// `"Jane Doe "` and `"jane doe"` compare equal. The derived ordering is
/// `(date, employee, project)` and is the order every stage emits keys in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    /// Work date
    pub date: NaiveDate,
    /// Canonical employee name
    pub employee: String,
    /// Canonical project id
    pub project: String,
}

impl NaturalKey {
    /// Builds a key, canonicalizing the text components
    ///
    /// Returns `None` if either text component is blank after trimming.
    pub fn new(date: NaiveDate, employee: &str, project: &str) -> Option<Self> {
        let employee = canonical(employee)?;
        let project = canonical(project)?;
        Some(Self {
            date,
            employee,
            project,
        })
    }
}

fn canonical(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.date.format("%Y-%m-%d"),
            self.employee,
            self.project
        )
    }
}
