//! In-process store
//!
//! Holds timesheet lines in a shared ordered map. Transactions stage their
//! writes privately and publish them on commit, so an abandoned transaction
//! leaves no trace. Used for local runs without a database and in tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::traits::{Store, StoreTransaction};
use crate::domain::{
    ChangeEntry, ChangeKind, NaturalKey, PersistedRecord, PersistedSnapshot, RowApplyError,
    ScopeWindow, StoreError,
};

type Rows = Arc<Mutex<BTreeMap<NaturalKey, PersistedRecord>>>;

/// Shared in-memory store
///
/// Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Rows,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing rows
    pub fn with_rows(rows: impl IntoIterator<Item = PersistedRecord>) -> Self {
        let map = rows.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            rows: Arc::new(Mutex::new(map)),
        }
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        lock(&self.rows).map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Committed row for `key`
    pub fn get(&self, key: &NaturalKey) -> Option<PersistedRecord> {
        lock(&self.rows).ok()?.get(key).cloned()
    }

    /// All committed rows
    pub fn rows(&self) -> Vec<PersistedRecord> {
        lock(&self.rows)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn lock(rows: &Rows) -> Result<MutexGuard<'_, BTreeMap<NaturalKey, PersistedRecord>>, StoreError> {
    rows.lock()
        .map_err(|_| StoreError::Connection("memory store lock poisoned".to_string()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        lock(&self.rows).map(|_| ())
    }

    async fn fetch_persisted(&self, scope: &ScopeWindow) -> Result<PersistedSnapshot, StoreError> {
        let rows = lock(&self.rows)?;
        Ok(rows
            .iter()
            .filter(|(key, _)| scope.contains(key.date))
            .map(|(key, row)| (key.clone(), row.clone()))
            .collect())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            rows: self.rows.clone(),
            staged: BTreeMap::new(),
        }))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

struct MemoryTransaction {
    rows: Rows,
    staged: BTreeMap<NaturalKey, PersistedRecord>,
}

impl MemoryTransaction {
    fn current(&self, key: &NaturalKey) -> Result<Option<PersistedRecord>, StoreError> {
        if let Some(row) = self.staged.get(key) {
            return Ok(Some(row.clone()));
        }
        Ok(lock(&self.rows)?.get(key).cloned())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn apply(&mut self, entry: &ChangeEntry) -> Result<(), StoreError> {
        let after = entry.after.as_ref().ok_or_else(|| {
            RowApplyError::Constraint(format!("{} entry for {} has no new row", entry.kind, entry.key))
        })?;
        if after.working_hours.is_sign_negative() && !after.working_hours.is_zero() {
            return Err(RowApplyError::Constraint("working_hours must not be negative".into()).into());
        }

        let current = self.current(&entry.key)?;
        match entry.kind {
            ChangeKind::Insert => {
                if current.is_some() {
                    return Err(RowApplyError::Constraint(format!(
                        "duplicate natural key {}",
                        entry.key
                    ))
                    .into());
                }
            }
            ChangeKind::Update => {
                let current =
                    current.ok_or_else(|| RowApplyError::NotFound(entry.key.to_string()))?;
                let expected = entry.before.as_ref().map(|b| b.last_modified);
                if expected != Some(current.last_modified) {
                    return Err(RowApplyError::Conflict(entry.key.to_string()).into());
                }
            }
            ChangeKind::Unchanged | ChangeKind::Stale => {
                return Err(RowApplyError::Constraint(format!(
                    "{} entries are not writes",
                    entry.kind
                ))
                .into());
            }
        }

        self.staged.insert(
            entry.key.clone(),
            PersistedRecord::from_record(after, Utc::now()),
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut rows = lock(&self.rows)?;
        let count = self.staged.len();
        rows.extend(self.staged);
        tracing::debug!(rows = count, "Memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        tracing::debug!(rows = self.staged.len(), "Memory transaction rolled back");
        Ok(())
    }
}
