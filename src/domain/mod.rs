//! Domain models and types for Tally.
//!
//! This module contains the record types, change classification and error
//! taxonomy shared by every stage of a reconciliation run.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Identifiers** ([`SourceId`], [`RunId`], [`NaturalKey`])
//! - **Records** ([`RawRow`], [`NormalizedRecord`], [`DeduplicatedRecord`], [`PersistedRecord`])
//! - **Changes** ([`ChangeEntry`], [`ApplyOutcome`])
//! - **Error types** ([`TallyError`], [`ValidationError`], [`StoreError`], ...)
//! - **Result type alias** ([`Result`])
//!
//! # Natural keys
//!
//! Two rows describe the same timesheet line when their work date, employee
//! and project agree, ignoring case and surrounding whitespace:
//!
//! ```rust
//! use tally::domain::NaturalKey;
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
//! let a = NaturalKey::new(date, "Jane Doe", "PRJ-7").unwrap();
//! let b = NaturalKey::new(date, " jane doe ", "prj-7").unwrap();
//! assert_eq!(a, b);
//! ```

pub mod change;
pub mod errors;
pub mod ids;
pub mod key;
pub mod record;
pub mod result;
pub mod scope;

// Re-export commonly used types for convenience
pub use change::{ApplyOutcome, ApplyResult, ChangeEntry, ChangeKind};
pub use errors::{
    DuplicateError, ErrorDetail, ErrorKind, ExtractionError, NotifyError, RowApplyError,
    StoreError, TallyError, ValidationError,
};
pub use ids::{RunId, SourceId};
pub use key::NaturalKey;
pub use record::{
    DeduplicatedRecord, NormalizedRecord, PersistedRecord, PersistedSnapshot, RawRow, RawValue,
    SourceBatch, SourceRef,
};
pub use result::Result;
pub use scope::ScopeWindow;
