//! Run orchestration

pub mod coordinator;

pub use coordinator::{ReconcileCoordinator, RunOutcome};
