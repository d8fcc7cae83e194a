//! Plain-text and JSON renderings of a [`RunSummary`]
//!
//! Notifiers deliver these strings; they never format reports themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use serde::Serialize;

use super::summary::{FlaggedRecord, RunSummary};
use crate::domain::{ApplyResult, ChangeKind, ErrorDetail, ErrorKind};

/// Flagged records listed individually before the report truncates
const MAX_DETAIL_LINES: usize = 30;

/// Renders the run error report with the first `max_notify_errors` errors
pub fn render_error_report(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TALLY RUN REPORT - {}", summary.run_id);
    let _ = writeln!(out, "Status: {}", summary.status());
    let _ = writeln!(out, "Scope: {}", summary.scope);
    let _ = writeln!(out, "Started: {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Duration: {:.1}s", summary.duration.as_secs_f64());
    if summary.dry_run {
        let _ = writeln!(out, "Mode: dry run (no changes written)");
    }
    if summary.interrupted {
        let _ = writeln!(out, "Run was interrupted before all stages completed");
    }
    if let Some(cause) = &summary.fatal_cause {
        let _ = writeln!(out, "Fatal: {cause}");
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "Sources: {} read, {} failed",
        summary.sources_read, summary.sources_failed
    );
    let _ = writeln!(
        out,
        "Rows: {} extracted, {} out of scope, {} invalid",
        summary.rows_extracted, summary.rows_out_of_scope, summary.rows_invalid
    );
    let _ = writeln!(
        out,
        "Changes: {} inserted, {} updated, {} unchanged, {} stale",
        summary.count(ChangeKind::Insert),
        summary.count(ChangeKind::Update),
        summary.count(ChangeKind::Unchanged),
        summary.count(ChangeKind::Stale)
    );
    let _ = writeln!(
        out,
        "Results: {} applied, {} failed, {} skipped",
        summary.result_count(ApplyResult::Applied),
        summary.result_count(ApplyResult::Failed),
        summary.result_count(ApplyResult::Skipped)
    );
    let _ = writeln!(
        out,
        "Duplicates: {} dropped, {} rejected",
        summary.dropped_duplicates.len() - summary.rejected_duplicates(),
        summary.rejected_duplicates()
    );
    out.push('\n');

    let shown = summary.errors_for_notification();
    if shown.is_empty() {
        if summary.fatal_cause.is_none() {
            out.push_str("No errors recorded.\n");
        }
        return out;
    }

    let _ = writeln!(out, "Errors (showing {} of {}):", shown.len(), summary.error_count);
    for (i, error) in shown.iter().enumerate() {
        let marker = if error.fatal { " [FATAL]" } else { "" };
        let _ = writeln!(out, "  {}. {}{}", i + 1, error, marker);
    }
    if summary.error_count > shown.len() {
        let _ = writeln!(
            out,
            "... and {} more errors not shown",
            summary.error_count - shown.len()
        );
    }
    out
}

/// Renders the management report of flagged records, grouped by employee
pub fn render_management_report(summary: &RunSummary) -> String {
    let today = summary.started_at.format("%B %d, %Y");

    if summary.flagged.is_empty() {
        return format!(
            "TIMESHEET STATUS REPORT - {today}\n\nNo issues found in timesheets for {}. \
             All timesheets are complete and properly filled out.\n",
            summary.scope
        );
    }

    let mut by_employee: BTreeMap<&str, Vec<&FlaggedRecord>> = BTreeMap::new();
    for record in &summary.flagged {
        by_employee
            .entry(record.key.employee.as_str())
            .or_default()
            .push(record);
    }

    let mut out = String::new();
    let _ = writeln!(out, "TIMESHEET ISSUES REPORT - {} ({today})", summary.scope);
    let _ = writeln!(out, "Total problematic records: {}", summary.flagged.len());
    let _ = writeln!(out, "Affected employees: {}", by_employee.len());
    out.push('\n');

    for records in by_employee.values() {
        let days: BTreeSet<_> = records.iter().map(|r| r.date()).collect();
        let name = records
            .first()
            .map(|r| r.employee_name.as_str())
            .unwrap_or_default();
        let _ = writeln!(out, "{name}: {} days with issues", days.len());
    }
    out.push('\n');

    let mut detail: Vec<&FlaggedRecord> = summary.flagged.iter().collect();
    detail.sort_by(|a, b| a.key.cmp(&b.key));
    for record in detail.iter().take(MAX_DETAIL_LINES) {
        let _ = writeln!(
            out,
            "{} | {} | {} | Hours: {} | Status: {}",
            record.date().format("%Y-%m-%d"),
            record.employee_name,
            record.project_id,
            record.working_hours.normalize(),
            record.status
        );
    }
    if detail.len() > MAX_DETAIL_LINES {
        let _ = writeln!(
            out,
            "... and {} more records not shown",
            detail.len() - MAX_DETAIL_LINES
        );
    }
    out
}

#[derive(Debug, Serialize)]
struct SummaryDocument<'a> {
    run_id: String,
    status: &'static str,
    scope: &'a crate::domain::ScopeWindow,
    dry_run: bool,
    interrupted: bool,
    started_at: String,
    duration_ms: u64,
    sources_read: usize,
    sources_failed: usize,
    rows_extracted: usize,
    rows_out_of_scope: usize,
    rows_invalid: usize,
    records: usize,
    changes: BTreeMap<&'static str, usize>,
    results: BTreeMap<String, usize>,
    duplicates_dropped: usize,
    duplicates_rejected: usize,
    flagged: usize,
    error_count: usize,
    fatal_cause: Option<ErrorEntry<'a>>,
    errors: Vec<ErrorEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ErrorEntry<'a> {
    kind: ErrorKind,
    message: &'a str,
    key: Option<&'a str>,
    source: Option<&'a str>,
    row_number: Option<usize>,
    fatal: bool,
}

impl<'a> From<&'a ErrorDetail> for ErrorEntry<'a> {
    fn from(e: &'a ErrorDetail) -> Self {
        Self {
            kind: e.kind,
            message: &e.message,
            key: e.key.as_deref(),
            source: e.source.as_deref(),
            row_number: e.row_number,
            fatal: e.fatal,
        }
    }
}

/// Renders a machine-readable summary
pub fn render_summary_json(summary: &RunSummary) -> Result<String, serde_json::Error> {
    let doc = SummaryDocument {
        run_id: summary.run_id.to_string(),
        status: summary.status().as_str(),
        scope: &summary.scope,
        dry_run: summary.dry_run,
        interrupted: summary.interrupted,
        started_at: summary.started_at.to_rfc3339(),
        duration_ms: summary.duration.as_millis() as u64,
        sources_read: summary.sources_read,
        sources_failed: summary.sources_failed,
        rows_extracted: summary.rows_extracted,
        rows_out_of_scope: summary.rows_out_of_scope,
        rows_invalid: summary.rows_invalid,
        records: summary.records_deduplicated,
        changes: summary
            .change_counts
            .iter()
            .map(|(kind, n)| (kind.as_str(), *n))
            .collect(),
        results: summary
            .result_counts
            .iter()
            .map(|(result, n)| (result.to_string(), *n))
            .collect(),
        duplicates_dropped: summary.dropped_duplicates.len(),
        duplicates_rejected: summary.rejected_duplicates(),
        flagged: summary.flagged.len(),
        error_count: summary.error_count,
        fatal_cause: summary.fatal_cause.as_ref().map(ErrorEntry::from),
        errors: summary
            .errors_for_notification()
            .iter()
            .map(ErrorEntry::from)
            .collect(),
    };
    serde_json::to_string_pretty(&doc)
}
