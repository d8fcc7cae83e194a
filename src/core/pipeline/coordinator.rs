//! Reconcile coordinator - main orchestrator for a reconciliation run
//!
//! Stages run strictly in order: extract and normalize, deduplicate, read the
//! store snapshot, diff, apply, summarize, notify. The shutdown signal is
//! checked between stages only, so an open transaction always finishes
//! before a cancellation is honoured.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::watch;

use crate::adapters::database::{create_store, Store};
use crate::adapters::excel::{ExcelExtractor, Extractor};
use crate::adapters::notifier::{create_notifier, DeliveryReport, Notifier};
use crate::config::TallyConfig;
use crate::core::apply::{Applier, WritePlan};
use crate::core::dedup::Deduplicator;
use crate::core::diff::diff;
use crate::core::normalize::Normalizer;
use crate::core::report::{RunAggregator, RunStatus, RunSummary};
use crate::domain::{
    ExtractionError, NormalizedRecord, NotifyError, Result, RunId, ScopeWindow, StoreError,
};
use crate::{log_stage_complete, log_stage_start};

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Reports delivered after the run
    pub deliveries: Vec<DeliveryReport>,
    /// Deliveries that failed; these never affect applied data
    pub notification_errors: Vec<NotifyError>,
}

/// Reconcile coordinator
pub struct ReconcileCoordinator {
    config: TallyConfig,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn Store + Send + Sync>,
    notifier: Arc<dyn Notifier + Send + Sync>,
    shutdown: watch::Receiver<bool>,
    scope: Option<ScopeWindow>,
}

impl ReconcileCoordinator {
    /// Create a coordinator from explicit collaborators
    pub fn new(
        config: TallyConfig,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn Store + Send + Sync>,
        notifier: Arc<dyn Notifier + Send + Sync>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            extractor,
            store,
            notifier,
            shutdown,
            scope: None,
        }
    }

    /// Create a coordinator with the collaborators named by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or the notifier is
    /// misconfigured.
    pub async fn from_config(config: TallyConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let extractor = Arc::new(ExcelExtractor::new(
            config.extractor.clone(),
            config.columns.clone(),
        ));
        let store = create_store(&config).await?;
        let notifier = create_notifier(&config.notify)?;
        Ok(Self::new(config, extractor, store, notifier, shutdown))
    }

    /// Pins the scope window instead of deriving it from today's date
    pub fn with_scope(mut self, scope: ScopeWindow) -> Self {
        self.scope = Some(scope);
        self
    }

    /// The window this coordinator reconciles
    pub fn scope(&self) -> ScopeWindow {
        self.scope
            .clone()
            .unwrap_or_else(|| self.config.scope.window(Local::now().date_naive()))
    }

    /// Execute one reconciliation run
    ///
    /// Never fails: every error is recorded on the returned summary.
    pub async fn execute(&self) -> RunOutcome {
        let scope = self.scope();
        let run_id = RunId::generate();
        tracing::info!(
            run_id = %run_id,
            scope = %scope,
            store = self.store.backend_name(),
            extractor = self.extractor.name(),
            dry_run = self.config.application.dry_run,
            "Starting reconciliation run"
        );

        let mut aggregator = RunAggregator::new(
            run_id,
            scope.clone(),
            self.config.application.dry_run,
            &self.config.report,
        );
        self.run_stages(&scope, &mut aggregator).await;

        let summary = aggregator.finish();
        summary.log_summary();

        let (deliveries, notification_errors) = self.notify(&summary).await;
        RunOutcome {
            summary,
            deliveries,
            notification_errors,
        }
    }

    async fn run_stages(&self, scope: &ScopeWindow, aggregator: &mut RunAggregator) {
        let Some(records) = self.extract(scope, aggregator).await else {
            return;
        };
        if self.interrupted(aggregator) {
            return;
        }

        log_stage_start!("dedup");
        let started = Instant::now();
        let deduplicated = Deduplicator::new(self.config.dedup.enabled).deduplicate(records);
        aggregator.record_dedup(&deduplicated);
        log_stage_complete!("dedup", deduplicated.records.len(), started.elapsed());
        if self.interrupted(aggregator) {
            return;
        }

        log_stage_start!("snapshot");
        let started = Instant::now();
        let snapshot = match self.store_call(self.store.fetch_persisted(scope)).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "Failed to read persisted records");
                aggregator.record_store_error(&err);
                return;
            }
        };
        log_stage_complete!("snapshot", snapshot.len(), started.elapsed());

        let entries = diff(&deduplicated, &snapshot);
        aggregator.record_changes(&entries);
        if self.interrupted(aggregator) {
            return;
        }

        log_stage_start!("apply");
        let started = Instant::now();
        let plan = WritePlan::from_entries(entries);
        let applier = Applier::new(self.store_timeout(), self.config.application.dry_run);
        let report = applier.apply(self.store.as_ref(), plan).await;
        aggregator.record_apply(&report);
        log_stage_complete!("apply", report.outcomes.len(), started.elapsed());
    }

    /// Reads and normalizes every source
    ///
    /// Returns `None` when discovery failed or the run was interrupted.
    async fn extract(
        &self,
        scope: &ScopeWindow,
        aggregator: &mut RunAggregator,
    ) -> Option<Vec<NormalizedRecord>> {
        log_stage_start!("extract");
        let started = Instant::now();

        let sources = match self.extractor_call(self.extractor.list_sources(scope)).await {
            Ok(sources) => sources,
            Err(err) => {
                tracing::error!(error = %err, "Source discovery failed");
                aggregator.record_extraction_error(None, &err);
                return None;
            }
        };

        let normalizer = Normalizer::new(&self.config.columns, &self.config.normalize);
        let mut records = Vec::new();
        for source in &sources {
            if self.interrupted(aggregator) {
                return None;
            }

            let batch = match self.extractor_call(self.extractor.fetch_rows(source, scope)).await {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::error!(source = %source, error = %err, "Failed to read source");
                    aggregator.record_extraction_error(Some(source), &err);
                    continue;
                }
            };
            aggregator.record_source_read(batch.rows.len());

            for row in &batch.rows {
                match normalizer.normalize(row, &batch.source) {
                    Ok(record) if scope.contains(record.key.date) => records.push(record),
                    Ok(_) => aggregator.record_out_of_scope(),
                    Err(err) => {
                        tracing::debug!(
                            source = %source,
                            row = row.row_number,
                            error = %err,
                            "Row failed validation"
                        );
                        aggregator.record_validation_error(source, row.row_number, &err);
                    }
                }
            }
        }

        log_stage_complete!("extract", records.len(), started.elapsed());
        Some(records)
    }

    /// Delivers the run reports
    ///
    /// The error report goes out whenever the run was interrupted or not a
    /// clean success. The management report needs a complete run, so it is
    /// sent only when enabled and the run neither failed nor was interrupted.
    async fn notify(&self, summary: &RunSummary) -> (Vec<DeliveryReport>, Vec<NotifyError>) {
        let mut deliveries = Vec::new();
        let mut errors = Vec::new();
        let status = summary.status();

        if status != RunStatus::Success || summary.interrupted {
            match self
                .notify_call(self.notifier.send_error_report(summary))
                .await
            {
                Ok(delivery) => deliveries.push(delivery),
                Err(err) => {
                    tracing::error!(notifier = self.notifier.name(), error = %err, "Failed to deliver error report");
                    errors.push(err);
                }
            }
        }

        if summary.interrupted {
            tracing::info!("Run interrupted, management report not sent");
        } else if self.config.notify.management_report && status != RunStatus::Failed {
            match self
                .notify_call(self.notifier.send_management_report(summary))
                .await
            {
                Ok(delivery) => deliveries.push(delivery),
                Err(err) => {
                    tracing::error!(notifier = self.notifier.name(), error = %err, "Failed to deliver management report");
                    errors.push(err);
                }
            }
        }

        (deliveries, errors)
    }

    fn interrupted(&self, aggregator: &mut RunAggregator) -> bool {
        if *self.shutdown.borrow() {
            tracing::warn!(run_id = %aggregator.run_id(), "Shutdown requested, stopping run");
            aggregator.mark_interrupted();
            return true;
        }
        false
    }

    fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.config.store.timeout_seconds)
    }

    async fn store_call<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        let timeout = self.store_timeout();
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(timeout.as_secs())))
    }

    async fn extractor_call<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, ExtractionError>>,
    ) -> std::result::Result<T, ExtractionError> {
        let secs = self.config.extractor.timeout_seconds;
        tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .unwrap_or(Err(ExtractionError::Timeout(secs)))
    }

    async fn notify_call<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, NotifyError>>,
    ) -> std::result::Result<T, NotifyError> {
        let secs = self.config.notify.timeout_seconds;
        tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .unwrap_or(Err(NotifyError::Timeout(secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::{MemoryStore, StoreTransaction};
    use crate::adapters::notifier::{LogNotifier, ReportKind};
    use crate::config::StoreKind;
    use crate::domain::{
        ApplyResult, ChangeKind, ErrorKind, PersistedSnapshot, RawRow, RawValue, SourceBatch,
        SourceId, SourceRef,
    };
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::BTreeMap;

    /// Serves fixed batches keyed by source id; unknown sources fail
    struct FixedExtractor {
        batches: BTreeMap<String, Vec<RawRow>>,
        broken: Vec<String>,
    }

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn list_sources(
            &self,
            _scope: &ScopeWindow,
        ) -> std::result::Result<Vec<SourceId>, ExtractionError> {
            self.batches
                .keys()
                .chain(self.broken.iter())
                .map(|s| SourceId::new(s.clone()).map_err(ExtractionError::SourceNotFound))
                .collect()
        }

        async fn fetch_rows(
            &self,
            source: &SourceId,
            _scope: &ScopeWindow,
        ) -> std::result::Result<SourceBatch, ExtractionError> {
            let rows = self
                .batches
                .get(source.as_str())
                .ok_or_else(|| ExtractionError::Unreadable(source.to_string()))?;
            Ok(SourceBatch {
                source: SourceRef {
                    id: source.clone(),
                    extracted_at: Utc.with_ymd_and_hms(2025, 2, 20, 8, 0, 0).unwrap(),
                },
                rows: rows.clone(),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn row(n: usize, date: &str, employee: &str, hours: f64) -> RawRow {
        RawRow::new(n)
            .with("Date", RawValue::Text(date.to_string()))
            .with("Employee Name", RawValue::Text(employee.to_string()))
            .with("Project ID", RawValue::Text("PRJ-1".to_string()))
            .with("Working Hours", RawValue::Number(hours))
    }

    /// Store that never answers a snapshot read
    struct StalledStore;

    #[async_trait]
    impl Store for StalledStore {
        async fn test_connection(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn fetch_persisted(
            &self,
            _scope: &ScopeWindow,
        ) -> std::result::Result<PersistedSnapshot, StoreError> {
            std::future::pending().await
        }

        async fn begin_transaction(
            &self,
        ) -> std::result::Result<Box<dyn StoreTransaction>, StoreError> {
            Err(StoreError::Connection("not expected".to_string()))
        }

        fn backend_name(&self) -> &str {
            "stalled"
        }
    }

    fn one_row_extractor() -> FixedExtractor {
        let mut batches = BTreeMap::new();
        batches.insert("team.xlsx".to_string(), vec![row(2, "2025-02-03", "Ann", 8.0)]);
        FixedExtractor {
            batches,
            broken: vec![],
        }
    }

    fn coordinator(
        extractor: FixedExtractor,
        store: MemoryStore,
        shutdown: watch::Receiver<bool>,
    ) -> ReconcileCoordinator {
        coordinator_with(TallyConfig::default(), extractor, Arc::new(store), shutdown)
    }

    fn coordinator_with(
        mut config: TallyConfig,
        extractor: FixedExtractor,
        store: Arc<dyn Store + Send + Sync>,
        shutdown: watch::Receiver<bool>,
    ) -> ReconcileCoordinator {
        config.store.kind = StoreKind::Memory;
        let scope = ScopeWindow::current_month(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        ReconcileCoordinator::new(
            config,
            Arc::new(extractor),
            store,
            Arc::new(LogNotifier::new()),
            shutdown,
        )
        .with_scope(scope)
    }

    #[tokio::test]
    async fn test_run_inserts_and_filters_scope() {
        let mut batches = BTreeMap::new();
        batches.insert(
            "team.xlsx".to_string(),
            vec![
                row(2, "2025-02-03", "Ann", 8.0),
                row(3, "2025-03-03", "Ann", 8.0),
                row(4, "", "Ann", 8.0),
            ],
        );
        let store = MemoryStore::new();
        let (_tx, rx) = watch::channel(false);
        let outcome = coordinator(
            FixedExtractor {
                batches,
                broken: vec![],
            },
            store.clone(),
            rx,
        )
        .execute()
        .await;

        let summary = &outcome.summary;
        assert_eq!(summary.rows_extracted, 3);
        assert_eq!(summary.rows_out_of_scope, 1);
        assert_eq!(summary.rows_invalid, 1);
        assert_eq!(summary.count(ChangeKind::Insert), 1);
        assert_eq!(summary.result_count(ApplyResult::Applied), 1);
        assert_eq!(summary.status(), RunStatus::SuccessWithWarnings);
        assert_eq!(store.len(), 1);
        assert!(outcome.notification_errors.is_empty());
    }

    #[tokio::test]
    async fn test_broken_source_does_not_stop_others() {
        let mut batches = BTreeMap::new();
        batches.insert("good.xlsx".to_string(), vec![row(2, "2025-02-03", "Ann", 8.0)]);
        let store = MemoryStore::new();
        let (_tx, rx) = watch::channel(false);
        let outcome = coordinator(
            FixedExtractor {
                batches,
                broken: vec!["bad.xlsx".to_string()],
            },
            store.clone(),
            rx,
        )
        .execute()
        .await;

        assert_eq!(outcome.summary.sources_failed, 1);
        assert_eq!(outcome.summary.status(), RunStatus::Failed);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_applies_nothing() {
        let mut batches = BTreeMap::new();
        batches.insert("team.xlsx".to_string(), vec![row(2, "2025-02-03", "Ann", 8.0)]);
        let store = MemoryStore::new();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let outcome = coordinator(
            FixedExtractor {
                batches,
                broken: vec![],
            },
            store.clone(),
            rx,
        )
        .execute()
        .await;

        assert!(outcome.summary.interrupted);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_run_skips_management_report() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut config = TallyConfig::default();
        config.notify.management_report = true;

        let outcome = coordinator_with(
            config,
            one_row_extractor(),
            Arc::new(MemoryStore::new()),
            rx,
        )
        .execute()
        .await;

        assert!(outcome.summary.interrupted);
        assert_eq!(outcome.summary.error_count, 0);
        let kinds: Vec<_> = outcome.deliveries.iter().map(|d| d.report).collect();
        assert_eq!(kinds, vec![ReportKind::Error]);
    }

    #[tokio::test]
    async fn test_completed_run_sends_management_report() {
        let (_tx, rx) = watch::channel(false);
        let mut config = TallyConfig::default();
        config.notify.management_report = true;

        let outcome = coordinator_with(
            config,
            one_row_extractor(),
            Arc::new(MemoryStore::new()),
            rx,
        )
        .execute()
        .await;

        assert_eq!(outcome.summary.status(), RunStatus::Success);
        let kinds: Vec<_> = outcome.deliveries.iter().map(|d| d.report).collect();
        assert_eq!(kinds, vec![ReportKind::Management]);
    }

    #[tokio::test]
    async fn test_snapshot_read_times_out() {
        let (_tx, rx) = watch::channel(false);
        let mut config = TallyConfig::default();
        config.store.timeout_seconds = 1;

        let outcome = coordinator_with(config, one_row_extractor(), Arc::new(StalledStore), rx)
            .execute()
            .await;

        let summary = &outcome.summary;
        assert_eq!(summary.status(), RunStatus::Failed);
        assert_eq!(summary.records_deduplicated, 1);
        assert_eq!(summary.count(ChangeKind::Insert), 0);
        let cause = summary.fatal_cause.as_ref().expect("timeout recorded");
        assert_eq!(cause.kind, ErrorKind::StoreConnection);
        assert_eq!(cause.message, StoreError::Timeout(1).to_string());
    }
}
