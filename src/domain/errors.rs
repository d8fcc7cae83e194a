//! Domain error types
//!
//! This module defines the error taxonomy for Tally. Row-level errors
//! ([`ValidationError`], [`RowApplyError`], [`DuplicateError`]) are collected by
//! the stage that produced them; batch-fatal errors ([`StoreError::Connection`],
//! [`StoreError::Timeout`]) stop the Applier for the current run. None of these
//! types expose third-party driver errors.

use thiserror::Error;

/// Main Tally error type
///
/// Used for startup, configuration and I/O failures that are not tied to a
/// single record.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Extraction errors surfaced outside of a run
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Store errors surfaced outside of a run
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Notification errors surfaced outside of a run
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Row-level normalization failure
///
/// The row is excluded from the run and the remaining rows are processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A natural-key component is missing or blank
    #[error("missing natural key field '{field}'")]
    MissingKey { field: String },

    /// The date cell matched none of the accepted formats
    #[error("unparseable date '{value}'")]
    UnparseableDate { value: String },

    /// Working hours outside `0..=ceiling`
    #[error("working hours {value} outside allowed range 0..={ceiling}")]
    OutOfRange { value: String, ceiling: String },

    /// A numeric field could not be read as a number
    #[error("invalid number '{value}' in field '{field}'")]
    InvalidNumber { field: String, value: String },
}

/// Informational duplicate notice produced by the Deduplicator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicateError {
    /// Superseded by a later record with the same key
    #[error("duplicate of {key} in batch, superseded by {kept_source}")]
    InBatch { key: String, kept_source: String },

    /// Rejected because deduplication is disabled and the key is ambiguous
    #[error("ambiguous key {key} occurs {occurrences} times in batch")]
    Rejected { key: String, occurrences: usize },
}

/// Failure reading one extraction source
///
/// Fatal for that source only; other sources are still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// Folder or file does not exist
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// File could not be opened or parsed
    #[error("source unreadable: {0}")]
    Unreadable(String),

    /// Workbook lacks the expected sheet
    #[error("{source_id} is missing the '{sheet}' sheet")]
    MissingSheet { source_id: String, sheet: String },

    /// Header row lacks required columns
    #[error("{source_id} is missing required columns: {columns}")]
    MissingColumns { source_id: String, columns: String },

    /// Extraction did not finish in time
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
}

/// Row-level store failure
///
/// Attributable to exactly one change entry; the transaction continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowApplyError {
    /// A store-enforced constraint rejected the row
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The persisted row changed since the snapshot was taken
    #[error("concurrent modification of {0}")]
    Conflict(String),

    /// An update targeted a row that no longer exists
    #[error("row not found: {0}")]
    NotFound(String),
}

/// Store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection loss, pool exhaustion, commit failure or any error not
    /// attributable to a single row
    #[error("store connection error: {0}")]
    Connection(String),

    /// A store call exceeded its timeout
    #[error("store call timed out after {0}s")]
    Timeout(u64),

    /// Row-level failure
    #[error(transparent)]
    Row(#[from] RowApplyError),
}

impl StoreError {
    /// Whether this error aborts the whole transaction
    pub fn is_batch_fatal(&self) -> bool {
        !matches!(self, StoreError::Row(_))
    }
}

/// Notification delivery failure
///
/// Never reverses already-applied changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Notifier is misconfigured
    #[error("notifier configuration error: {0}")]
    Configuration(String),

    /// Delivery failed
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Delivery did not finish in time
    #[error("delivery timed out after {0}s")]
    Timeout(u64),
}

/// Category of a row or run error as reported to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Source could not be read
    Extraction,
    /// Row failed normalization
    Validation,
    /// Ambiguous duplicate rejected
    Duplicate,
    /// Store rejected one row
    RowApply,
    /// Store failed for the whole batch
    StoreConnection,
}

/// Error detail attached to an outcome or summary
///
/// Provides the context operators need to locate the offending row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Error category
    pub kind: ErrorKind,

    /// Error message
    pub message: String,

    /// Natural key in display form, when known
    pub key: Option<String>,

    /// Source identifier, when known
    pub source: Option<String>,

    /// Sheet row number, when known
    pub row_number: Option<usize>,

    /// Whether the error escalates the run status to failed
    pub fatal: bool,
}

impl ErrorDetail {
    /// Creates a new error detail
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            key: None,
            source: None,
            row_number: None,
            fatal: false,
        }
    }

    /// Sets the natural key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the source identifier
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the sheet row number
    pub fn with_row(mut self, row_number: usize) -> Self {
        self.row_number = Some(row_number);
        self
    }

    /// Marks the error as fatal for the run
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}")?;
            if let Some(row) = self.row_number {
                write!(f, " row {row}")?;
            }
            write!(f, ": ")?;
        }
        if let Some(key) = &self.key {
            write!(f, "[{key}] ")?;
        }
        write!(f, "{}", self.message)
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        TallyError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for TallyError {
    fn from(err: toml::de::Error) -> Self {
        TallyError::Configuration(format!("TOML parse error: {err}"))
    }
}
