//! Spreadsheet extraction
//!
//! The [`Extractor`] trait is the seam between the reconciliation pipeline
//! and wherever timesheet rows come from. [`ExcelExtractor`] reads workbooks
//! from local folders.

pub mod discovery;
pub mod extractor;
pub mod reader;

use async_trait::async_trait;

use crate::domain::{ExtractionError, ScopeWindow, SourceBatch, SourceId};

pub use extractor::ExcelExtractor;

/// A provider of raw timesheet rows
///
/// A failing source is fatal for that source only; the pipeline records the
/// failure and continues with the remaining sources.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Lists the sources available for `scope`
    async fn list_sources(&self, scope: &ScopeWindow) -> Result<Vec<SourceId>, ExtractionError>;

    /// Reads every row of one source
    async fn fetch_rows(
        &self,
        source: &SourceId,
        scope: &ScopeWindow,
    ) -> Result<SourceBatch, ExtractionError>;

    /// Name used in logs
    fn name(&self) -> &str;
}
