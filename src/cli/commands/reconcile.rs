//! Reconcile command implementation
//!
//! This module implements the `reconcile` command, which runs one full
//! reconciliation of the configured workbooks against the store.

use crate::config::{load_config, TallyConfig};
use crate::core::pipeline::{ReconcileCoordinator, RunOutcome};
use crate::core::report::RunStatus;
use crate::domain::TallyError;
use chrono::NaiveDate;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the reconcile command
#[derive(Args, Debug, Default)]
pub struct ReconcileArgs {
    /// Compute and report changes without writing to the store
    #[arg(long)]
    pub dry_run: bool,

    /// First work date to reconcile (YYYY-MM-DD); disables current-month scope
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last work date to reconcile (YYYY-MM-DD); disables current-month scope
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Override the folders to scan (repeatable)
    #[arg(long = "folder", value_name = "PATH")]
    pub folders: Vec<String>,

    /// Reject every duplicated key instead of keeping the most recent record
    #[arg(long)]
    pub no_dedup: bool,
}

impl ReconcileArgs {
    /// Execute the reconcile command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Starting reconcile command");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.application.dry_run {
            println!("DRY RUN MODE - no changes will be written to the store");
            println!();
        }

        let coordinator = match ReconcileCoordinator::from_config(config, shutdown_signal).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize reconciliation");
                eprintln!("Failed to initialize reconciliation: {e}");
                return Ok(startup_exit_code(&e));
            }
        };

        println!("Reconciling {}...", coordinator.scope());
        let outcome = coordinator.execute().await;
        print_outcome(&outcome);

        Ok(exit_code(&outcome))
    }

    fn apply_overrides(&self, config: &mut TallyConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            tracing::info!(start = ?self.start_date, end = ?self.end_date, "Overriding scope from CLI");
            config.scope.current_month = false;
            config.scope.start_date = self.start_date;
            config.scope.end_date = self.end_date;
        }
        if !self.folders.is_empty() {
            tracing::info!(folders = ?self.folders, "Overriding folders from CLI");
            config.extractor.folders = self.folders.clone();
        }
        if self.no_dedup {
            tracing::info!("Disabling deduplication from CLI");
            config.dedup.enabled = false;
        }
    }
}

/// Exit code for a failure before the run started
fn startup_exit_code(error: &TallyError) -> i32 {
    match error {
        TallyError::Store(_) => 4,
        TallyError::Configuration(_) | TallyError::Notify(_) => 2,
        _ => 5,
    }
}

/// Exit code for a completed run
pub fn exit_code(outcome: &RunOutcome) -> i32 {
    let summary = &outcome.summary;
    if summary.interrupted {
        return 130;
    }
    match summary.status() {
        RunStatus::Success => 0,
        RunStatus::SuccessWithWarnings => 1,
        RunStatus::Failed if summary.fatal_cause.is_some() => 4,
        RunStatus::Failed => 5,
    }
}

fn print_outcome(outcome: &RunOutcome) {
    use crate::domain::{ApplyResult, ChangeKind};

    let summary = &outcome.summary;
    println!();
    println!("Reconciliation Summary:");
    println!("  Run ID: {}", summary.run_id);
    println!("  Status: {}", summary.status());
    println!("  Sources: {} read, {} failed", summary.sources_read, summary.sources_failed);
    println!(
        "  Rows: {} extracted, {} invalid, {} out of scope",
        summary.rows_extracted, summary.rows_invalid, summary.rows_out_of_scope
    );
    println!(
        "  Changes: {} insert, {} update, {} unchanged, {} stale",
        summary.count(ChangeKind::Insert),
        summary.count(ChangeKind::Update),
        summary.count(ChangeKind::Unchanged),
        summary.count(ChangeKind::Stale)
    );
    println!(
        "  Results: {} applied, {} failed, {} skipped",
        summary.result_count(ApplyResult::Applied),
        summary.result_count(ApplyResult::Failed),
        summary.result_count(ApplyResult::Skipped)
    );
    println!("  Duplicates dropped: {}", summary.dropped_duplicates.len());
    println!("  Flagged records: {}", summary.flagged.len());
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if let Some(cause) = &summary.fatal_cause {
        println!("Fatal: {cause}");
        println!();
    }

    let shown = summary.errors_for_log();
    if !shown.is_empty() {
        println!("Errors ({} total):", summary.error_count);
        for error in shown {
            println!("  - {error}");
        }
        if summary.error_count > shown.len() {
            println!("  ... and {} more", summary.error_count - shown.len());
        }
        println!();
    }

    for err in &outcome.notification_errors {
        println!("Report delivery failed: {err}");
    }

    if summary.interrupted {
        println!("Run interrupted. Committed changes are kept; rerun to finish.");
    }
}
