//! Spreadsheet extractor backed by calamine

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::discovery::{discover, DiscoveryRules};
use super::reader::read_sheet;
use super::Extractor;
use crate::config::{ColumnsConfig, ExtractorConfig};
use crate::domain::{ExtractionError, ScopeWindow, SourceBatch, SourceId, SourceRef};

/// Reads timesheet workbooks from local folders
///
/// Each workbook is one source, identified by its path. The file's
/// modification time is used as the batch's extraction timestamp, so a more
/// recently saved workbook wins deduplication.
#[derive(Debug, Clone)]
pub struct ExcelExtractor {
    config: ExtractorConfig,
    columns: ColumnsConfig,
    rules: DiscoveryRules,
}

impl ExcelExtractor {
    pub fn new(config: ExtractorConfig, columns: ColumnsConfig) -> Self {
        let rules = DiscoveryRules::from_config(&config);
        Self {
            config,
            columns,
            rules,
        }
    }
}

#[async_trait]
impl Extractor for ExcelExtractor {
    async fn list_sources(&self, _scope: &ScopeWindow) -> Result<Vec<SourceId>, ExtractionError> {
        let folders = self.config.folders.clone();
        let rules = self.rules.clone();
        let paths = tokio::task::spawn_blocking(move || discover(&folders, &rules))
            .await
            .map_err(|e| ExtractionError::Unreadable(format!("discovery task failed: {e}")))??;

        tracing::info!(count = paths.len(), "Discovered workbooks");
        paths
            .into_iter()
            .map(|path| {
                SourceId::new(path.display().to_string()).map_err(ExtractionError::SourceNotFound)
            })
            .collect()
    }

    async fn fetch_rows(
        &self,
        source: &SourceId,
        _scope: &ScopeWindow,
    ) -> Result<SourceBatch, ExtractionError> {
        let path = PathBuf::from(source.as_str());
        let sheet = self.config.sheet_name.clone();
        let columns = self.columns.clone();

        let (rows, modified) = tokio::task::spawn_blocking(move || {
            let metadata = std::fs::metadata(&path)
                .map_err(|_| ExtractionError::SourceNotFound(path.display().to_string()))?;
            let modified: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            let rows = read_sheet(&path, &sheet, &columns)?;
            Ok::<_, ExtractionError>((rows, modified))
        })
        .await
        .map_err(|e| ExtractionError::Unreadable(format!("{source}: read task failed: {e}")))??;

        Ok(SourceBatch {
            source: SourceRef {
                id: source.clone(),
                extracted_at: modified,
            },
            rows,
        })
    }

    fn name(&self) -> &str {
        "excel"
    }
}
