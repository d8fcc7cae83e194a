//! Store abstraction traits
//!
//! This module defines the traits a relational backend must implement to hold
//! reconciled timesheet lines.

use crate::domain::{ChangeEntry, PersistedSnapshot, ScopeWindow, StoreError};
use async_trait::async_trait;

/// Persistent store of timesheet lines
///
/// Implementations translate driver failures into [`StoreError`]: a failure
/// attributable to one row becomes [`StoreError::Row`], anything else is
/// batch-fatal.
#[async_trait]
pub trait Store: Send + Sync {
    /// Test the store connection
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the store cannot be reached.
    async fn test_connection(&self) -> Result<(), StoreError>;

    /// Fetch every persisted row whose work date lies within `scope`
    ///
    /// # Errors
    ///
    /// Returns a batch-fatal error if the snapshot cannot be read.
    async fn fetch_persisted(&self, scope: &ScopeWindow) -> Result<PersistedSnapshot, StoreError>;

    /// Open a transaction for applying one write plan
    ///
    /// # Errors
    ///
    /// Returns a batch-fatal error if no transaction can be started.
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Short name of the backend for logs
    fn backend_name(&self) -> &str;
}

/// An open store transaction
///
/// Dropping a transaction without calling [`commit`](Self::commit) must leave
/// the store as if [`rollback`](Self::rollback) had been called.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Apply one INSERT or UPDATE entry
    ///
    /// UPDATE entries carry the persisted row's `last_modified` marker; if the
    /// row changed since the snapshot the store returns
    /// [`RowApplyError::Conflict`](crate::domain::RowApplyError::Conflict).
    ///
    /// # Errors
    ///
    /// Row-level failures leave the transaction usable; batch-fatal failures
    /// do not.
    async fn apply(&mut self, entry: &ChangeEntry) -> Result<(), StoreError>;

    /// Make every applied entry durable
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every applied entry
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
