//! Notifier that emits reports through tracing

use async_trait::async_trait;

use super::{DeliveryReport, Notifier, ReportKind};
use crate::core::report::{render_error_report, render_management_report, RunSummary};
use crate::domain::NotifyError;

/// Writes rendered reports to the log at info level
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, summary: &RunSummary, report: ReportKind, text: String) -> DeliveryReport {
        tracing::info!(
            run_id = %summary.run_id,
            report = %report,
            "\n{}",
            text
        );
        DeliveryReport {
            report,
            destination: "log".to_string(),
            bytes: text.len(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_error_report(&self, summary: &RunSummary) -> Result<DeliveryReport, NotifyError> {
        Ok(self.emit(summary, ReportKind::Error, render_error_report(summary)))
    }

    async fn send_management_report(
        &self,
        summary: &RunSummary,
    ) -> Result<DeliveryReport, NotifyError> {
        Ok(self.emit(summary, ReportKind::Management, render_management_report(summary)))
    }

    fn name(&self) -> &str {
        "log"
    }
}
