//! Run aggregation and report rendering

pub mod render;
pub mod summary;

pub use render::{render_error_report, render_management_report, render_summary_json};
pub use summary::{FlaggedRecord, RunAggregator, RunStatus, RunSummary};
