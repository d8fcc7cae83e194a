//! Transactional application of a write plan

use std::future::Future;
use std::time::Duration;

use crate::adapters::database::traits::{Store, StoreTransaction};
use crate::core::apply::plan::WritePlan;
use crate::domain::{
    ApplyOutcome, ChangeEntry, ErrorDetail, ErrorKind, RowApplyError, StoreError,
};

/// Outcome of applying one write plan
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// One outcome per plan entry, in key order
    pub outcomes: Vec<ApplyOutcome>,
    /// Batch-fatal cause, if the transaction was abandoned
    pub fatal: Option<StoreError>,
    /// Whether a transaction was committed
    pub committed: bool,
}

/// Applies write plans against a [`Store`]
#[derive(Debug, Clone)]
pub struct Applier {
    timeout: Duration,
    dry_run: bool,
}

impl Applier {
    pub fn new(timeout: Duration, dry_run: bool) -> Self {
        Self { timeout, dry_run }
    }

    /// Applies `plan` inside a single transaction
    ///
    /// Row-level failures mark only their entry as FAILED. A batch-fatal
    /// failure rolls the transaction back and marks every write FAILED with
    /// the same cause. UNCHANGED and STALE entries are always SKIPPED.
    pub async fn apply(&self, store: &dyn Store, plan: WritePlan) -> ApplyReport {
        let WritePlan { writes, skipped } = plan;
        let mut report = ApplyReport {
            outcomes: skipped
                .iter()
                .map(|e| ApplyOutcome::skipped(e.key.clone(), e.kind))
                .collect(),
            ..Default::default()
        };

        if writes.is_empty() {
            tracing::debug!("No writes planned, skipping transaction");
            return report;
        }

        if self.dry_run {
            tracing::info!(writes = writes.len(), "Dry run: skipping store writes");
            report
                .outcomes
                .extend(writes.iter().map(|e| ApplyOutcome::skipped(e.key.clone(), e.kind)));
            sort_outcomes(&mut report.outcomes);
            return report;
        }

        let mut tx = match self.timed(store.begin_transaction()).await {
            Ok(tx) => tx,
            Err(err) => {
                tracing::error!(error = %err, "Failed to begin transaction");
                fail_all(&mut report, &writes, err);
                return report;
            }
        };

        let mut row_results: Vec<Result<(), RowApplyError>> = Vec::with_capacity(writes.len());
        let mut fatal = None;
        for entry in &writes {
            match self.timed(tx.apply(entry)).await {
                Ok(()) => row_results.push(Ok(())),
                Err(StoreError::Row(err)) => {
                    tracing::warn!(key = %entry.key, kind = %entry.kind, error = %err, "Row rejected by store");
                    row_results.push(Err(err));
                }
                Err(err) => {
                    tracing::error!(key = %entry.key, error = %err, "Batch-fatal store error, rolling back");
                    fatal = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = fatal {
            self.rollback(tx).await;
            fail_all(&mut report, &writes, err);
            return report;
        }

        if let Err(err) = self.commit(tx).await {
            tracing::error!(error = %err, "Commit failed");
            fail_all(&mut report, &writes, err);
            return report;
        }

        report.committed = true;
        for (entry, result) in writes.iter().zip(row_results) {
            let outcome = match result {
                Ok(()) => ApplyOutcome::applied(entry.key.clone(), entry.kind),
                Err(err) => ApplyOutcome::failed(
                    entry.key.clone(),
                    entry.kind,
                    row_detail(entry, &StoreError::Row(err)),
                ),
            };
            report.outcomes.push(outcome);
        }
        sort_outcomes(&mut report.outcomes);
        report
    }

    async fn commit(&self, tx: Box<dyn StoreTransaction>) -> Result<(), StoreError> {
        match self.timed(tx.commit()).await {
            Err(StoreError::Row(err)) => Err(StoreError::Connection(format!(
                "commit rejected: {err}"
            ))),
            other => other,
        }
    }

    async fn rollback(&self, tx: Box<dyn StoreTransaction>) {
        if let Err(err) = self.timed(tx.rollback()).await {
            tracing::warn!(error = %err, "Rollback failed; the store discards the transaction on disconnect");
        }
    }

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_secs())),
        }
    }
}

fn fail_all(report: &mut ApplyReport, writes: &[ChangeEntry], cause: StoreError) {
    report.outcomes.extend(writes.iter().map(|entry| {
        ApplyOutcome::failed(entry.key.clone(), entry.kind, row_detail(entry, &cause))
    }));
    sort_outcomes(&mut report.outcomes);
    report.fatal = Some(cause);
}

fn row_detail(entry: &ChangeEntry, err: &StoreError) -> ErrorDetail {
    let detail = match err {
        StoreError::Row(_) => ErrorDetail::new(ErrorKind::RowApply, err.to_string()),
        _ => ErrorDetail::new(ErrorKind::StoreConnection, err.to_string()).fatal(),
    }
    .with_key(entry.key.to_string());

    match &entry.after {
        Some(after) => detail
            .with_source(after.source.to_string())
            .with_row(after.row_number),
        None => detail,
    }
}

fn sort_outcomes(outcomes: &mut [ApplyOutcome]) {
    outcomes.sort_by(|a, b| a.key.cmp(&b.key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::memory::MemoryStore;
    use crate::core::dedup::Deduplicator;
    use crate::core::diff::diff;
    use crate::domain::{
        ApplyResult, ChangeKind, NaturalKey, NormalizedRecord, PersistedSnapshot, ScopeWindow,
        SourceId,
    };
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record(day: u32, hours: i64) -> NormalizedRecord {
        NormalizedRecord {
            key: NaturalKey::new(NaiveDate::from_ymd_opt(2025, 1, day).unwrap(), "e1", "p1").unwrap(),
            employee_name: "E1".into(),
            project_id: "P1".into(),
            working_hours: Decimal::new(hours, 0),
            role: None,
            location: None,
            status: None,
            source: SourceId::new("a.xlsx").unwrap(),
            extracted_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            row_number: day as usize + 1,
        }
    }

    fn plan(records: Vec<NormalizedRecord>, persisted: &PersistedSnapshot) -> WritePlan {
        WritePlan::from_entries(diff(&Deduplicator::new(true).deduplicate(records), persisted))
    }

    fn applier() -> Applier {
        Applier::new(Duration::from_secs(5), false)
    }

    /// Store whose transactions fail, or never answer, on the nth apply call
    struct BrokenStore {
        fail_at: usize,
        error: StoreError,
        hang: bool,
        begun: Arc<AtomicUsize>,
        rolled_back: Arc<AtomicUsize>,
    }

    struct BrokenTransaction {
        calls: usize,
        fail_at: usize,
        error: StoreError,
        hang: bool,
        rolled_back: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Store for BrokenStore {
        async fn test_connection(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn fetch_persisted(&self, _scope: &ScopeWindow) -> Result<PersistedSnapshot, StoreError> {
            Ok(PersistedSnapshot::new())
        }

        async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
            self.begun.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(BrokenTransaction {
                calls: 0,
                fail_at: self.fail_at,
                error: self.error.clone(),
                hang: self.hang,
                rolled_back: self.rolled_back.clone(),
            }))
        }

        fn backend_name(&self) -> &str {
            "broken"
        }
    }

    #[async_trait]
    impl StoreTransaction for BrokenTransaction {
        async fn apply(&mut self, _entry: &ChangeEntry) -> Result<(), StoreError> {
            self.calls += 1;
            if self.calls == self.fail_at && self.hang {
                std::future::pending::<()>().await;
            }
            if self.calls == self.fail_at {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            self.rolled_back.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn broken(fail_at: usize, error: StoreError) -> BrokenStore {
        BrokenStore {
            fail_at,
            error,
            hang: false,
            begun: Arc::new(AtomicUsize::new(0)),
            rolled_back: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn hanging(hang_at: usize) -> BrokenStore {
        BrokenStore {
            hang: true,
            ..broken(hang_at, StoreError::Connection("unused".into()))
        }
    }

    #[tokio::test]
    async fn test_insert_applied() {
        let store = MemoryStore::new();
        let plan = plan(vec![record(5, 8)], &PersistedSnapshot::new());

        let report = applier().apply(&store, plan).await;

        assert!(report.committed);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].result, ApplyResult::Applied);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_plan_opens_no_transaction() {
        let store = broken(1, StoreError::Connection("unused".into()));
        let report = applier().apply(&store, WritePlan::default()).await;
        assert!(report.outcomes.is_empty());
        assert_eq!(store.begun.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unchanged_entries_issue_no_writes() {
        let store = broken(1, StoreError::Connection("unused".into()));
        let existing = record(5, 8);
        let persisted: PersistedSnapshot = [(
            existing.key.clone(),
            crate::domain::PersistedRecord::from_record(&existing, Utc::now()),
        )]
        .into_iter()
        .collect();

        let report = applier().apply(&store, plan(vec![existing], &persisted)).await;

        assert_eq!(report.outcomes[0].kind, ChangeKind::Unchanged);
        assert_eq!(report.outcomes[0].result, ApplyResult::Skipped);
        assert_eq!(store.begun.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_skips_writes() {
        let store = MemoryStore::new();
        let plan = plan(vec![record(5, 8), record(6, 8)], &PersistedSnapshot::new());

        let report = Applier::new(Duration::from_secs(5), true).apply(&store, plan).await;

        assert!(!report.committed);
        assert!(report.outcomes.iter().all(|o| o.result == ApplyResult::Skipped));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_row_error_fails_only_that_entry() {
        let store = broken(2, RowApplyError::Constraint("hours_non_negative".into()).into());
        let plan = plan(vec![record(1, 8), record(2, 8), record(3, 8)], &PersistedSnapshot::new());

        let report = applier().apply(&store, plan).await;

        assert!(report.committed);
        assert!(report.fatal.is_none());
        let results: Vec<_> = report.outcomes.iter().map(|o| o.result).collect();
        assert_eq!(
            results,
            vec![ApplyResult::Applied, ApplyResult::Failed, ApplyResult::Applied]
        );
        let detail = report.outcomes[1].error.as_ref().unwrap();
        assert_eq!(detail.kind, ErrorKind::RowApply);
        assert!(!detail.fatal);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_every_write() {
        let store = broken(4, StoreError::Connection("connection reset".into()));
        let records = (1..=10).map(|d| record(d, 8)).collect();

        let report = applier().apply(&store, plan(records, &PersistedSnapshot::new())).await;

        assert!(!report.committed);
        assert_eq!(report.fatal, Some(StoreError::Connection("connection reset".into())));
        assert_eq!(report.outcomes.len(), 10);
        let messages: std::collections::HashSet<_> = report
            .outcomes
            .iter()
            .map(|o| {
                assert_eq!(o.result, ApplyResult::Failed);
                o.error.as_ref().unwrap().message.clone()
            })
            .collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(store.rolled_back.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unanswered_write_times_out_and_rolls_back() {
        let store = hanging(3);
        let records = (1..=6).map(|d| record(d, 8)).collect();
        let applier = Applier::new(Duration::from_millis(20), false);

        let report = applier.apply(&store, plan(records, &PersistedSnapshot::new())).await;

        assert!(!report.committed);
        assert_eq!(report.fatal, Some(StoreError::Timeout(0)));
        assert_eq!(store.rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcomes.len(), 6);
        for outcome in &report.outcomes {
            assert_eq!(outcome.result, ApplyResult::Failed);
            let detail = outcome.error.as_ref().unwrap();
            assert_eq!(detail.kind, ErrorKind::StoreConnection);
            assert!(detail.fatal);
            assert_eq!(detail.message, StoreError::Timeout(0).to_string());
        }
    }
}
