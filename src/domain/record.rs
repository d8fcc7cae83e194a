//! Timesheet record types as they flow through a run
//!
//! A [`RawRow`] is produced by an extractor, turned into a
//! [`NormalizedRecord`] by the normalizer, collapsed into one
//! [`DeduplicatedRecord`] per key, and compared against the store's
//! [`PersistedRecord`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

use super::ids::SourceId;
use super::key::NaturalKey;

/// One untyped cell value as read from a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl RawValue {
    /// True for empty cells and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the value as text for display fields and error messages
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            RawValue::Bool(b) => b.to_string(),
            RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            RawValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// One extracted row, keyed by header name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    /// 1-based row number within the source sheet
    pub row_number: usize,
    pub fields: BTreeMap<String, RawValue>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style insert used by extractors and tests
    pub fn with(mut self, column: impl Into<String>, value: RawValue) -> Self {
        self.fields.insert(column.into(), value);
        self
    }

    /// Returns the value for `column`, treating absent columns as empty
    pub fn get(&self, column: &str) -> &RawValue {
        self.fields.get(column).unwrap_or(&RawValue::Empty)
    }

    pub fn is_blank(&self) -> bool {
        self.fields.values().all(RawValue::is_blank)
    }
}

/// Where and when a batch of rows was extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub id: SourceId,
    /// Modification time of the source, used for deduplication
    pub extracted_at: DateTime<Utc>,
}

/// All rows read from one source
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: SourceRef,
    pub rows: Vec<RawRow>,
}

/// A timesheet line in canonical, comparable form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub key: NaturalKey,
    /// Trimmed display form of the employee name
    pub employee_name: String,
    /// Trimmed display form of the project id
    pub project_id: String,
    pub working_hours: Decimal,
    pub role: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub source: SourceId,
    pub extracted_at: DateTime<Utc>,
    pub row_number: usize,
}

/// The single authoritative record for a key within one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeduplicatedRecord(NormalizedRecord);

impl DeduplicatedRecord {
    /// Only the deduplicator should call this; it guarantees key uniqueness
    pub(crate) fn new(record: NormalizedRecord) -> Self {
        Self(record)
    }

    pub fn into_inner(self) -> NormalizedRecord {
        self.0
    }
}

impl Deref for DeduplicatedRecord {
    type Target = NormalizedRecord;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The store's current row for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub key: NaturalKey,
    pub employee_name: String,
    pub project_id: String,
    pub working_hours: Decimal,
    pub role: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    /// Optimistic concurrency marker
    pub last_modified: DateTime<Utc>,
}

impl PersistedRecord {
    /// Builds the row the store would hold after writing `record`
    pub fn from_record(record: &NormalizedRecord, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: record.key.clone(),
            employee_name: record.employee_name.clone(),
            project_id: record.project_id.clone(),
            working_hours: record.working_hours,
            role: record.role.clone(),
            location: record.location.clone(),
            status: record.status.clone(),
            source: Some(record.source.to_string()),
            last_modified,
        }
    }
}

/// Persisted rows for one scope window, in key order
pub type PersistedSnapshot = BTreeMap<NaturalKey, PersistedRecord>;
