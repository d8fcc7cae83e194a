//! End-to-end reconciliation scenarios against in-process stores

mod common;

use std::sync::Arc;

use common::{at, coordinator, date, memory_config, row, FlakyStore, ScriptedExtractor};
use rust_decimal::Decimal;
use tally::adapters::database::MemoryStore;
use tally::cli::commands::reconcile::exit_code;
use tally::core::dedup::DropReason;
use tally::core::report::{render_error_report, render_summary_json, RunStatus};
use tally::domain::{ApplyResult, ChangeKind, ErrorKind, NaturalKey};

#[tokio::test]
async fn test_new_line_is_inserted() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new().with_sheet(
        "2025-02/ann.xlsx",
        at(10, 8),
        vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 7.5)],
    );

    let outcome = coordinator(memory_config(), extractor, Arc::new(store.clone()))
        .execute()
        .await;

    let summary = &outcome.summary;
    assert_eq!(summary.status(), RunStatus::Success);
    assert_eq!(summary.count(ChangeKind::Insert), 1);
    assert_eq!(summary.result_count(ApplyResult::Applied), 1);
    assert_eq!(exit_code(&outcome), 0);

    let key = NaturalKey::new(date(2025, 2, 3), "ann lee", "prj-1").unwrap();
    let stored = store.get(&key).expect("row committed");
    assert_eq!(stored.employee_name, "Ann Lee");
    assert_eq!(stored.working_hours, Decimal::new(75, 1));
    assert_eq!(stored.source.as_deref(), Some("2025-02/ann.xlsx"));
}

#[tokio::test]
async fn test_identical_line_is_unchanged_and_not_written() {
    let store = MemoryStore::new();
    let sheet = vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)];
    let extractor = ScriptedExtractor::new().with_sheet("ann.xlsx", at(10, 8), sheet);

    coordinator(memory_config(), extractor.clone(), Arc::new(store.clone()))
        .execute()
        .await;
    let key = NaturalKey::new(date(2025, 2, 3), "Ann Lee", "PRJ-1").unwrap();
    let first_write = store.get(&key).unwrap().last_modified;

    let outcome = coordinator(memory_config(), extractor, Arc::new(store.clone()))
        .execute()
        .await;

    let summary = &outcome.summary;
    assert_eq!(summary.count(ChangeKind::Unchanged), 1);
    assert_eq!(summary.count(ChangeKind::Insert), 0);
    assert_eq!(summary.result_count(ApplyResult::Skipped), 1);
    assert_eq!(summary.result_count(ApplyResult::Applied), 0);
    assert_eq!(store.get(&key).unwrap().last_modified, first_write);
}

#[tokio::test]
async fn test_changed_hours_update_the_persisted_line() {
    let store = MemoryStore::new();
    let before = ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(10, 8),
        vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)],
    );
    coordinator(memory_config(), before, Arc::new(store.clone()))
        .execute()
        .await;

    let after = ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(11, 8),
        vec![row(2, "2025-02-03", "ANN LEE ", "prj-1", 6.0)],
    );
    let outcome = coordinator(memory_config(), after, Arc::new(store.clone()))
        .execute()
        .await;

    assert_eq!(outcome.summary.count(ChangeKind::Update), 1);
    assert_eq!(outcome.summary.result_count(ApplyResult::Applied), 1);
    assert_eq!(store.len(), 1);
    let key = NaturalKey::new(date(2025, 2, 3), "ann lee", "prj-1").unwrap();
    assert_eq!(store.get(&key).unwrap().working_hours, Decimal::new(6, 0));
}

#[tokio::test]
async fn test_missing_line_is_reported_stale_not_deleted() {
    let store = MemoryStore::new();
    let both = ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(10, 8),
        vec![
            row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0),
            row(3, "2025-02-04", "Ann Lee", "PRJ-1", 8.0),
        ],
    );
    coordinator(memory_config(), both, Arc::new(store.clone()))
        .execute()
        .await;

    let one = ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(11, 8),
        vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)],
    );
    let outcome = coordinator(memory_config(), one, Arc::new(store.clone()))
        .execute()
        .await;

    assert_eq!(outcome.summary.count(ChangeKind::Stale), 1);
    assert_eq!(outcome.summary.count(ChangeKind::Unchanged), 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_later_duplicate_wins() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new()
        .with_sheet(
            "early.xlsx",
            at(10, 8),
            vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 6.0)],
        )
        .with_sheet(
            "late.xlsx",
            at(12, 8),
            vec![row(5, "2025-02-03", "ann lee", "PRJ-1", 8.0)],
        );

    let outcome = coordinator(memory_config(), extractor, Arc::new(store.clone()))
        .execute()
        .await;

    let summary = &outcome.summary;
    assert_eq!(summary.count(ChangeKind::Insert), 1);
    assert_eq!(summary.dropped_duplicates.len(), 1);
    let dropped = &summary.dropped_duplicates[0];
    assert_eq!(dropped.reason, DropReason::DuplicateInBatch);
    assert_eq!(dropped.source.as_str(), "early.xlsx");
    assert_eq!(dropped.row_number, 2);

    let key = NaturalKey::new(date(2025, 2, 3), "Ann Lee", "PRJ-1").unwrap();
    let stored = store.get(&key).unwrap();
    assert_eq!(stored.working_hours, Decimal::new(8, 0));
    assert_eq!(stored.source.as_deref(), Some("late.xlsx"));
}

#[tokio::test]
async fn test_duplicates_rejected_when_dedup_disabled() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new()
        .with_sheet(
            "early.xlsx",
            at(10, 8),
            vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 6.0)],
        )
        .with_sheet(
            "late.xlsx",
            at(12, 8),
            vec![row(5, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)],
        );
    let mut config = memory_config();
    config.dedup.enabled = false;

    let outcome = coordinator(config, extractor, Arc::new(store.clone()))
        .execute()
        .await;

    assert_eq!(outcome.summary.rejected_duplicates(), 2);
    assert_eq!(outcome.summary.count(ChangeKind::Insert), 0);
    assert_eq!(outcome.summary.status(), RunStatus::SuccessWithWarnings);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_connection_loss_fails_whole_batch() {
    let rows = (0..10u32)
        .map(|i| {
            row(
                i as usize + 2,
                &format!("2025-02-{:02}", i + 3),
                "Ann Lee",
                "PRJ-1",
                8.0,
            )
        })
        .collect();
    let extractor = ScriptedExtractor::new().with_sheet("ann.xlsx", at(10, 8), rows);
    let inner = MemoryStore::new();
    let flaky = FlakyStore::new(inner.clone(), 3);

    let outcome = coordinator(memory_config(), extractor, Arc::new(flaky.clone()))
        .execute()
        .await;

    let summary = &outcome.summary;
    assert_eq!(summary.count(ChangeKind::Insert), 10);
    assert_eq!(summary.result_count(ApplyResult::Failed), 10);
    assert_eq!(summary.result_count(ApplyResult::Applied), 0);
    assert_eq!(summary.status(), RunStatus::Failed);
    assert_eq!(flaky.attempts(), 4);
    assert!(inner.is_empty(), "nothing may be committed");

    let keyed: Vec<_> = summary.errors.iter().filter(|e| e.key.is_some()).collect();
    assert_eq!(keyed.len(), 10);
    assert!(keyed.iter().all(|e| e.kind == ErrorKind::StoreConnection));
    assert!(keyed.iter().all(|e| e.message == keyed[0].message));
    assert!(keyed[0].message.contains("connection reset by peer"));

    assert_eq!(exit_code(&outcome), 4);
}

#[tokio::test]
async fn test_store_failure_reported_when_row_errors_fill_the_cap() {
    let mut rows: Vec<_> = (0..25)
        .map(|i| row(i + 2, "sometime in February", "Ann Lee", "PRJ-1", 8.0))
        .collect();
    rows.push(row(27, "2025-02-03", "Ann Lee", "PRJ-1", 8.0));
    let extractor = ScriptedExtractor::new().with_sheet("ann.xlsx", at(10, 8), rows);
    let flaky = FlakyStore::new(MemoryStore::new(), 0);

    let outcome = coordinator(memory_config(), extractor, Arc::new(flaky))
        .execute()
        .await;

    let summary = &outcome.summary;
    assert_eq!(summary.rows_invalid, 25);
    assert_eq!(summary.result_count(ApplyResult::Failed), 1);
    assert_eq!(summary.status(), RunStatus::Failed);
    assert!(summary
        .errors_for_notification()
        .iter()
        .all(|e| e.kind == ErrorKind::Validation));

    let cause = summary.fatal_cause.as_ref().expect("store failure recorded");
    assert_eq!(cause.kind, ErrorKind::StoreConnection);
    assert!(cause.message.contains("connection reset by peer"));
    assert_eq!(exit_code(&outcome), 4);

    assert!(render_error_report(summary).contains("connection reset by peer"));
    assert!(render_summary_json(summary)
        .unwrap()
        .contains("connection reset by peer"));
}

#[tokio::test]
async fn test_dry_run_classifies_without_writing() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(10, 8),
        vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)],
    );
    let mut config = memory_config();
    config.application.dry_run = true;

    let outcome = coordinator(config, extractor, Arc::new(store.clone()))
        .execute()
        .await;

    assert!(outcome.summary.dry_run);
    assert_eq!(outcome.summary.count(ChangeKind::Insert), 1);
    assert_eq!(outcome.summary.result_count(ApplyResult::Skipped), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_problematic_status_is_flagged() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(10, 8),
        vec![
            row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)
                .with("Status", tally::domain::RawValue::Text("pending".to_string())),
            row(3, "2025-02-04", "Ann Lee", "PRJ-1", 8.0)
                .with("Status", tally::domain::RawValue::Text("Approved".to_string())),
        ],
    );

    let outcome = coordinator(memory_config(), extractor, Arc::new(store.clone()))
        .execute()
        .await;

    assert_eq!(outcome.summary.flagged.len(), 1);
    assert_eq!(outcome.summary.flagged[0].date(), date(2025, 2, 3));
    assert_eq!(store.len(), 2);
}
