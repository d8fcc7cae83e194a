//! Integration tests for graceful shutdown
//!
//! A shutdown request is honoured between stages: the run stops, reports
//! itself as interrupted, and never leaves a partial write behind.

mod common;

use std::sync::Arc;

use common::{at, february, memory_config, row, ScriptedExtractor};
use tally::adapters::database::MemoryStore;
use tally::adapters::notifier::LogNotifier;
use tally::cli::commands::reconcile::exit_code;
use tally::core::pipeline::ReconcileCoordinator;
use tally::domain::ChangeKind;
use tokio::sync::watch;

fn extractor() -> ScriptedExtractor {
    ScriptedExtractor::new().with_sheet(
        "ann.xlsx",
        at(10, 8),
        vec![row(2, "2025-02-03", "Ann Lee", "PRJ-1", 8.0)],
    )
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

#[tokio::test]
async fn test_interrupted_run_writes_nothing() {
    let store = MemoryStore::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator = ReconcileCoordinator::new(
        memory_config(),
        Arc::new(extractor()),
        Arc::new(store.clone()),
        Arc::new(LogNotifier::new()),
        shutdown_rx,
    )
    .with_scope(february());

    shutdown_tx.send(true).unwrap();
    let outcome = coordinator.execute().await;

    assert!(outcome.summary.interrupted);
    assert_eq!(outcome.summary.count(ChangeKind::Insert), 0);
    assert!(store.is_empty());
    assert_eq!(exit_code(&outcome), 130);
}

#[tokio::test]
async fn test_uninterrupted_run_completes() {
    let store = MemoryStore::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator = ReconcileCoordinator::new(
        memory_config(),
        Arc::new(extractor()),
        Arc::new(store.clone()),
        Arc::new(LogNotifier::new()),
        shutdown_rx,
    )
    .with_scope(february());

    let outcome = coordinator.execute().await;

    assert!(!outcome.summary.interrupted);
    assert_eq!(store.len(), 1);
    assert_eq!(exit_code(&outcome), 0);
}
