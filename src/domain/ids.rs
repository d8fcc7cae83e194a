//! Domain identifier types with validation
//!
//! Newtype wrappers keep source identifiers and run identifiers from being
//! mixed up with free-form strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Extraction source identifier
///
/// For spreadsheet sources this is the path of the workbook relative to the
/// folder it was discovered under. Ordering is lexicographic and is used as
/// the deduplication tie-break.
///
/// # Examples
///
/// ```
/// use tally::domain::ids::SourceId;
/// use std::str::FromStr;
///
/// let source = SourceId::from_str("team-a/timesheet.xlsx").unwrap();
/// assert_eq!(source.as_str(), "team-a/timesheet.xlsx");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a new SourceId from a string
    ///
    /// # Arguments
    ///
    /// * `id` - The source identifier string
    ///
    /// # Returns
    ///
    /// Returns `Ok(SourceId)` if the ID is non-blank, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Source ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the source ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a fresh random run id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
