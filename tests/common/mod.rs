//! Shared fixtures for the reconciliation integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tally::adapters::database::{MemoryStore, Store, StoreTransaction};
use tally::adapters::excel::Extractor;
use tally::adapters::notifier::LogNotifier;
use tally::config::{StoreKind, TallyConfig};
use tally::core::pipeline::ReconcileCoordinator;
use tally::domain::{
    ChangeEntry, ExtractionError, PersistedSnapshot, RawRow, RawValue, ScopeWindow, SourceBatch,
    SourceId, SourceRef, StoreError,
};
use tokio::sync::watch;

/// One workbook as the extractor would see it
#[derive(Debug, Clone)]
pub struct Sheet {
    pub extracted_at: DateTime<Utc>,
    pub rows: Vec<RawRow>,
}

/// Extractor serving fixed sheets keyed by source id
#[derive(Debug, Clone, Default)]
pub struct ScriptedExtractor {
    sheets: BTreeMap<String, Sheet>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, source: &str, extracted_at: DateTime<Utc>, rows: Vec<RawRow>) -> Self {
        self.sheets.insert(source.to_string(), Sheet { extracted_at, rows });
        self
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn list_sources(&self, _scope: &ScopeWindow) -> Result<Vec<SourceId>, ExtractionError> {
        self.sheets
            .keys()
            .map(|s| SourceId::new(s.clone()).map_err(ExtractionError::SourceNotFound))
            .collect()
    }

    async fn fetch_rows(
        &self,
        source: &SourceId,
        _scope: &ScopeWindow,
    ) -> Result<SourceBatch, ExtractionError> {
        let sheet = self
            .sheets
            .get(source.as_str())
            .ok_or_else(|| ExtractionError::SourceNotFound(source.to_string()))?;
        Ok(SourceBatch {
            source: SourceRef {
                id: source.clone(),
                extracted_at: sheet.extracted_at,
            },
            rows: sheet.rows.clone(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Store whose transactions lose the connection after a number of writes
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_after: usize,
    attempts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, fail_after: usize) -> Self {
        Self {
            inner,
            fail_after,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Write attempts seen across all transactions
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        self.inner.test_connection().await
    }

    async fn fetch_persisted(&self, scope: &ScopeWindow) -> Result<PersistedSnapshot, StoreError> {
        self.inner.fetch_persisted(scope).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin_transaction().await?,
            fail_after: self.fail_after,
            attempts: self.attempts.clone(),
        }))
    }

    fn backend_name(&self) -> &str {
        "flaky"
    }
}

struct FlakyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_after: usize,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTransaction for FlakyTransaction {
    async fn apply(&mut self, entry: &ChangeEntry) -> Result<(), StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_after {
            return Err(StoreError::Connection("connection reset by peer".to_string()));
        }
        self.inner.apply(entry).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, day, hour, 0, 0).unwrap()
}

/// February 2025
pub fn february() -> ScopeWindow {
    ScopeWindow::current_month(date(2025, 2, 1))
}

/// A sheet row with the default column headers
pub fn row(n: usize, day: &str, employee: &str, project: &str, hours: f64) -> RawRow {
    RawRow::new(n)
        .with("Date", RawValue::Text(day.to_string()))
        .with("Employee Name", RawValue::Text(employee.to_string()))
        .with("Project ID", RawValue::Text(project.to_string()))
        .with("Working Hours", RawValue::Number(hours))
}

pub fn memory_config() -> TallyConfig {
    let mut config = TallyConfig::default();
    config.store.kind = StoreKind::Memory;
    config
}

/// Coordinator over `store` pinned to February 2025
pub fn coordinator(
    config: TallyConfig,
    extractor: ScriptedExtractor,
    store: Arc<dyn Store + Send + Sync>,
) -> ReconcileCoordinator {
    let (_tx, rx) = watch::channel(false);
    ReconcileCoordinator::new(
        config,
        Arc::new(extractor),
        store,
        Arc::new(LogNotifier::new()),
        rx,
    )
    .with_scope(february())
}
