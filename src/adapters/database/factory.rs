//! Store factory
//!
//! This module provides the factory function that creates a store based on configuration.

use crate::adapters::database::memory::MemoryStore;
use crate::adapters::database::traits::Store;
use crate::adapters::postgresql::adapter::PostgresStore;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{StoreKind, TallyConfig};
use crate::domain::{Result, TallyError};
use std::sync::Arc;

/// Create a store based on the configuration
///
/// For PostgreSQL the schema is created if missing.
///
/// # Errors
///
/// Returns an error if the store cannot be created or reached.
pub async fn create_store(config: &TallyConfig) -> Result<Arc<dyn Store + Send + Sync>> {
    match config.store.kind {
        StoreKind::Memory => {
            tracing::info!("Creating in-memory store");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn Store + Send + Sync>)
        }
        StoreKind::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                TallyError::Configuration(
                    "postgresql configuration is required when store.kind = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL store");
            let client = PostgreSQLClient::new(pg_config.clone())?;
            client.test_connection().await?;
            client.ensure_schema().await?;

            Ok(Arc::new(PostgresStore::new(client)) as Arc<dyn Store + Send + Sync>)
        }
    }
}
