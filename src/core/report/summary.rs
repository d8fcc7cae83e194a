//! Run aggregation and summary
//!
//! The [`RunAggregator`] is fed by every stage of a run and produces an
//! immutable [`RunSummary`] once the run is over.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::config::ReportConfig;
use crate::core::apply::ApplyReport;
use crate::core::dedup::{DedupOutcome, DropReason, DroppedDuplicate};
use crate::domain::{
    ApplyResult, ChangeEntry, ChangeKind, ErrorDetail, ErrorKind, ExtractionError, NaturalKey,
    RunId, ScopeWindow, SourceId, StoreError, ValidationError,
};

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    SuccessWithWarnings,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::SuccessWithWarnings => "SUCCESS_WITH_WARNINGS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record whose status needs management attention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedRecord {
    pub key: NaturalKey,
    pub employee_name: String,
    pub project_id: String,
    pub working_hours: Decimal,
    pub status: String,
    pub source: SourceId,
    pub row_number: usize,
}

impl FlaggedRecord {
    pub fn date(&self) -> NaiveDate {
        self.key.date
    }
}

/// Accumulates counts and errors while a run progresses
#[derive(Debug)]
pub struct RunAggregator {
    run_id: RunId,
    scope: ScopeWindow,
    dry_run: bool,
    started: Instant,
    started_at: DateTime<Utc>,
    max_log_errors: usize,
    max_notify_errors: usize,
    problematic_statuses: Vec<String>,
    sources_read: usize,
    sources_failed: usize,
    rows_extracted: usize,
    rows_out_of_scope: usize,
    rows_invalid: usize,
    records_deduplicated: usize,
    change_counts: BTreeMap<ChangeKind, usize>,
    result_counts: HashMap<ApplyResult, usize>,
    dropped_duplicates: Vec<DroppedDuplicate>,
    flagged: Vec<FlaggedRecord>,
    errors: Vec<ErrorDetail>,
    error_count: usize,
    any_fatal: bool,
    fatal_cause: Option<ErrorDetail>,
    interrupted: bool,
}

impl RunAggregator {
    pub fn new(run_id: RunId, scope: ScopeWindow, dry_run: bool, config: &ReportConfig) -> Self {
        Self {
            run_id,
            scope,
            dry_run,
            started: Instant::now(),
            started_at: Utc::now(),
            max_log_errors: config.max_log_errors,
            max_notify_errors: config.max_notify_errors,
            problematic_statuses: config
                .problematic_statuses
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
            sources_read: 0,
            sources_failed: 0,
            rows_extracted: 0,
            rows_out_of_scope: 0,
            rows_invalid: 0,
            records_deduplicated: 0,
            change_counts: BTreeMap::new(),
            result_counts: HashMap::new(),
            dropped_duplicates: Vec::new(),
            flagged: Vec::new(),
            errors: Vec::new(),
            error_count: 0,
            any_fatal: false,
            fatal_cause: None,
            interrupted: false,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Records a source that was read successfully
    pub fn record_source_read(&mut self, rows: usize) {
        self.sources_read += 1;
        self.rows_extracted += rows;
    }

    /// Records a source (or the discovery step, when `source` is `None`)
    /// that could not be read
    pub fn record_extraction_error(&mut self, source: Option<&SourceId>, err: &ExtractionError) {
        self.sources_failed += 1;
        let mut detail = ErrorDetail::new(ErrorKind::Extraction, err.to_string()).fatal();
        if let Some(source) = source {
            detail = detail.with_source(source.as_str());
        }
        self.push_error(detail);
    }

    pub fn record_out_of_scope(&mut self) {
        self.rows_out_of_scope += 1;
    }

    pub fn record_validation_error(
        &mut self,
        source: &SourceId,
        row_number: usize,
        err: &ValidationError,
    ) {
        self.rows_invalid += 1;
        self.push_error(
            ErrorDetail::new(ErrorKind::Validation, err.to_string())
                .with_source(source.as_str())
                .with_row(row_number),
        );
    }

    /// Records the deduplicated batch, its dropped duplicates and any
    /// records carrying a problematic status
    pub fn record_dedup(&mut self, outcome: &DedupOutcome) {
        self.records_deduplicated = outcome.records.len();

        for dropped in &outcome.dropped {
            if dropped.reason == DropReason::DuplicateRejected {
                self.push_error(
                    ErrorDetail::new(ErrorKind::Duplicate, dropped.detail.to_string())
                        .with_key(dropped.key.to_string())
                        .with_source(dropped.source.as_str())
                        .with_row(dropped.row_number),
                );
            }
        }
        self.dropped_duplicates.extend(outcome.dropped.iter().cloned());

        for record in outcome.records.values() {
            let Some(status) = record.status.as_deref() else {
                continue;
            };
            if self.is_problematic(status) {
                self.flagged.push(FlaggedRecord {
                    key: record.key.clone(),
                    employee_name: record.employee_name.clone(),
                    project_id: record.project_id.clone(),
                    working_hours: record.working_hours,
                    status: status.to_string(),
                    source: record.source.clone(),
                    row_number: record.row_number,
                });
            }
        }
    }

    /// Records a batch-fatal store failure outside the applier, such as a
    /// failed snapshot read
    pub fn record_store_error(&mut self, err: &StoreError) {
        let detail = ErrorDetail::new(ErrorKind::StoreConnection, err.to_string()).fatal();
        self.record_fatal_cause(&detail);
        self.push_error(detail);
    }

    pub fn record_changes(&mut self, entries: &[ChangeEntry]) {
        for entry in entries {
            *self.change_counts.entry(entry.kind).or_insert(0) += 1;
        }
    }

    pub fn record_apply(&mut self, report: &ApplyReport) {
        for outcome in &report.outcomes {
            *self.result_counts.entry(outcome.result).or_insert(0) += 1;
            if let Some(detail) = &outcome.error {
                self.push_error(detail.clone());
            }
        }
        if let Some(err) = &report.fatal {
            self.any_fatal = true;
            self.record_fatal_cause(
                &ErrorDetail::new(ErrorKind::StoreConnection, err.to_string()).fatal(),
            );
        }
    }

    // Kept outside the capped error list; the first cause wins
    fn record_fatal_cause(&mut self, detail: &ErrorDetail) {
        if self.fatal_cause.is_none() {
            self.fatal_cause = Some(detail.clone());
        }
    }

    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn finish(self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            scope: self.scope,
            dry_run: self.dry_run,
            started_at: self.started_at,
            duration: self.started.elapsed(),
            sources_read: self.sources_read,
            sources_failed: self.sources_failed,
            rows_extracted: self.rows_extracted,
            rows_out_of_scope: self.rows_out_of_scope,
            rows_invalid: self.rows_invalid,
            records_deduplicated: self.records_deduplicated,
            change_counts: self.change_counts,
            result_counts: self.result_counts,
            dropped_duplicates: self.dropped_duplicates,
            flagged: self.flagged,
            errors: self.errors,
            error_count: self.error_count,
            any_fatal: self.any_fatal,
            fatal_cause: self.fatal_cause,
            interrupted: self.interrupted,
            max_log_errors: self.max_log_errors,
            max_notify_errors: self.max_notify_errors,
        }
    }

    fn is_problematic(&self, status: &str) -> bool {
        let status = status.trim().to_lowercase();
        self.problematic_statuses.iter().any(|s| *s == status)
    }

    // All errors are counted; only as many as any report can show are kept
    fn push_error(&mut self, detail: ErrorDetail) {
        self.error_count += 1;
        if detail.fatal {
            self.any_fatal = true;
        }
        if self.errors.len() < self.max_log_errors.max(self.max_notify_errors) {
            self.errors.push(detail);
        }
    }
}

/// Immutable summary of one reconciliation run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub scope: ScopeWindow,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub sources_read: usize,
    pub sources_failed: usize,
    pub rows_extracted: usize,
    pub rows_out_of_scope: usize,
    pub rows_invalid: usize,
    pub records_deduplicated: usize,
    pub change_counts: BTreeMap<ChangeKind, usize>,
    pub result_counts: HashMap<ApplyResult, usize>,
    pub dropped_duplicates: Vec<DroppedDuplicate>,
    pub flagged: Vec<FlaggedRecord>,
    /// Retained errors in encounter order
    pub errors: Vec<ErrorDetail>,
    /// Total number of errors, including ones not retained
    pub error_count: usize,
    pub any_fatal: bool,
    /// Batch-fatal store failure, retained regardless of the error cap
    pub fatal_cause: Option<ErrorDetail>,
    pub interrupted: bool,
    max_log_errors: usize,
    max_notify_errors: usize,
}

impl RunSummary {
    /// FAILED on any batch-fatal or fatal-flagged error, SUCCESS_WITH_WARNINGS
    /// on any other error or rejected duplicate, SUCCESS otherwise
    pub fn status(&self) -> RunStatus {
        if self.any_fatal {
            RunStatus::Failed
        } else if self.error_count > 0 || self.rejected_duplicates() > 0 {
            RunStatus::SuccessWithWarnings
        } else {
            RunStatus::Success
        }
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.change_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn result_count(&self, result: ApplyResult) -> usize {
        self.result_counts.get(&result).copied().unwrap_or(0)
    }

    pub fn rejected_duplicates(&self) -> usize {
        self.dropped_duplicates
            .iter()
            .filter(|d| d.reason == DropReason::DuplicateRejected)
            .count()
    }

    /// The first `max_log_errors` errors
    pub fn errors_for_log(&self) -> &[ErrorDetail] {
        &self.errors[..self.errors.len().min(self.max_log_errors)]
    }

    /// The first `max_notify_errors` errors
    pub fn errors_for_notification(&self) -> &[ErrorDetail] {
        &self.errors[..self.errors.len().min(self.max_notify_errors)]
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            status = %self.status(),
            scope = %self.scope,
            dry_run = self.dry_run,
            sources_read = self.sources_read,
            sources_failed = self.sources_failed,
            rows_extracted = self.rows_extracted,
            rows_out_of_scope = self.rows_out_of_scope,
            rows_invalid = self.rows_invalid,
            records = self.records_deduplicated,
            inserts = self.count(ChangeKind::Insert),
            updates = self.count(ChangeKind::Update),
            unchanged = self.count(ChangeKind::Unchanged),
            stale = self.count(ChangeKind::Stale),
            applied = self.result_count(ApplyResult::Applied),
            failed = self.result_count(ApplyResult::Failed),
            skipped = self.result_count(ApplyResult::Skipped),
            duplicates_dropped = self.dropped_duplicates.len(),
            flagged = self.flagged.len(),
            interrupted = self.interrupted,
            duration_ms = self.duration.as_millis() as u64,
            "Reconciliation completed"
        );

        if let Some(cause) = &self.fatal_cause {
            tracing::error!(cause = %cause, "Store failure stopped the run");
        }

        if self.error_count > 0 {
            let shown = self.errors_for_log();
            tracing::warn!(
                error_count = self.error_count,
                shown = shown.len(),
                "Reconciliation completed with errors"
            );
            for error in shown {
                tracing::warn!(
                    kind = ?error.kind,
                    fatal = error.fatal,
                    "{}",
                    error
                );
            }
        }
    }
}
