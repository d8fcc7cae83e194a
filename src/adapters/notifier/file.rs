//! Notifier that writes reports into a directory

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{DeliveryReport, Notifier, ReportKind};
use crate::core::report::{
    render_error_report, render_management_report, render_summary_json, RunSummary,
};
use crate::domain::NotifyError;

/// Writes one file per report, named after the run id
///
/// The error report is accompanied by a JSON summary for downstream tooling.
#[derive(Debug, Clone)]
pub struct FileNotifier {
    directory: PathBuf,
}

impl FileNotifier {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn write(&self, file_name: String, contents: &str) -> Result<PathBuf, NotifyError> {
        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            NotifyError::DeliveryFailed(format!(
                "cannot create {}: {e}",
                self.directory.display()
            ))
        })?;
        let path = self.directory.join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| NotifyError::DeliveryFailed(format!("cannot write {}: {e}", path.display())))?;
        Ok(path)
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    async fn send_error_report(&self, summary: &RunSummary) -> Result<DeliveryReport, NotifyError> {
        let json = render_summary_json(summary)
            .map_err(|e| NotifyError::DeliveryFailed(format!("cannot serialize summary: {e}")))?;
        self.write(format!("{}-summary.json", summary.run_id), &json)
            .await?;

        let text = render_error_report(summary);
        let path = self
            .write(format!("{}-errors.txt", summary.run_id), &text)
            .await?;
        tracing::info!(path = %path.display(), "Error report written");

        Ok(DeliveryReport {
            report: ReportKind::Error,
            destination: path.display().to_string(),
            bytes: text.len(),
        })
    }

    async fn send_management_report(
        &self,
        summary: &RunSummary,
    ) -> Result<DeliveryReport, NotifyError> {
        let text = render_management_report(summary);
        let path = self
            .write(format!("{}-management.txt", summary.run_id), &text)
            .await?;
        tracing::info!(path = %path.display(), "Management report written");

        Ok(DeliveryReport {
            report: ReportKind::Management,
            destination: path.display().to_string(),
            bytes: text.len(),
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}
