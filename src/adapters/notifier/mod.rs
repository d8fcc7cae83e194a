//! Run report delivery
//!
//! Notifiers are called once a run has completed. A delivery failure is
//! logged and recorded on the run outcome; it never affects applied data.

pub mod factory;
pub mod file;
pub mod log;

use async_trait::async_trait;
use std::fmt;

use crate::core::report::RunSummary;
use crate::domain::NotifyError;

pub use factory::create_notifier;
pub use file::FileNotifier;
pub use log::LogNotifier;

/// Which report a delivery carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Error,
    Management,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportKind::Error => "error",
            ReportKind::Management => "management",
        })
    }
}

/// Receipt for one delivered report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub report: ReportKind,
    /// Where the report went, e.g. a file path
    pub destination: String,
    pub bytes: usize,
}

/// Delivers rendered run reports
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the run error report
    async fn send_error_report(&self, summary: &RunSummary) -> Result<DeliveryReport, NotifyError>;

    /// Sends the management report of flagged records
    async fn send_management_report(
        &self,
        summary: &RunSummary,
    ) -> Result<DeliveryReport, NotifyError>;

    /// Name used in logs
    fn name(&self) -> &str;
}
