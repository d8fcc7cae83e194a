//! Core business logic for Tally.
//!
//! This module contains the reconciliation stages and their orchestration.
//!
//! # Modules
//!
//! - [`normalize`] - Raw rows to canonical records
//! - [`dedup`] - One authoritative record per natural key
//! - [`diff`] - Classification against the persisted snapshot
//! - [`apply`] - Write planning and transactional application
//! - [`report`] - Run aggregation and report rendering
//! - [`pipeline`] - Run orchestration
//!
//! # Reconciliation Workflow
//!
//! 1. **Extract**: Read rows from every source
//! 2. **Normalize**: Validate rows, drop those outside the scope window
//! 3. **Deduplicate**: Keep the most recent record per key
//! 4. **Snapshot**: Read the persisted records for the scope window
//! 5. **Diff**: Classify keys as INSERT, UPDATE, UNCHANGED or STALE
//! 6. **Apply**: Write inserts and updates in one transaction
//! 7. **Report**: Summarize the run and deliver reports
//!
//! # Example
//!
//! ```rust,no_run
//! use tally::config::load_config;
//! use tally::core::pipeline::ReconcileCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tally.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = ReconcileCoordinator::from_config(config, shutdown_rx).await?;
//! let outcome = coordinator.execute().await;
//!
//! println!("Status: {}", outcome.summary.status());
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod dedup;
pub mod diff;
pub mod normalize;
pub mod pipeline;
pub mod report;
