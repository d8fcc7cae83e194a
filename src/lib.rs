// Tally - Timesheet reconciliation engine
// Copyright (c) 2025 Tally Contributors
// Licensed under the MIT License

//! # Tally - Timesheet reconciliation engine
//!
//! Tally reads employee timesheet workbooks, reconciles them against a
//! relational store of timesheet lines, and reports what changed and what
//! needs attention.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Extracting** timesheet rows from Excel workbooks in configured folders
//! - **Normalizing** rows into typed records keyed by (date, employee, project)
//! - **Deduplicating** rows that describe the same line, keeping the most recent
//! - **Diffing** against the persisted snapshot for the scope window
//! - **Applying** inserts and updates in a single all-or-nothing transaction
//! - **Reporting** a run summary, an error report and a management report
//!
//! ## Architecture
//!
//! Tally follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Reconciliation stages and their orchestration
//! - [`adapters`] - External integrations (Excel, PostgreSQL, notifiers)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tally::config::load_config;
//! use tally::core::pipeline::ReconcileCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("tally.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let coordinator = ReconcileCoordinator::from_config(config, shutdown_rx).await?;
//!     let outcome = coordinator.execute().await;
//!
//!     println!("Run {} finished: {}", outcome.summary.run_id, outcome.summary.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! ### Change classification
//!
//! Every key seen in the batch or in the store is classified exactly once:
//!
//! ```rust
//! use tally::core::dedup::Deduplicator;
//! use tally::core::diff::diff;
//! use tally::domain::{ChangeKind, PersistedSnapshot};
//!
//! let outcome = Deduplicator::new(true).deduplicate(Vec::new());
//! let changes = diff(&outcome, &PersistedSnapshot::new());
//! assert!(changes.iter().all(|c| c.kind != ChangeKind::Insert));
//! ```
//!
//! ### Transactional apply
//!
//! Inserts and updates are written inside one transaction. A connection
//! failure rolls back the whole batch and marks every write as failed with
//! the same cause; nothing is partially committed.
//!
//! ## Error Handling
//!
//! Library code returns [`domain::TallyError`] through the [`domain::Result`]
//! alias. Row-level problems never abort a run; they are collected into the
//! [`core::report::RunSummary`] instead.
//!
//! ## Logging
//!
//! Tally uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(run_id = "f3c1", "Starting reconciliation");
//! warn!(source = "2025-01/jane.xlsx", row = 12, "Row rejected");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
