//! PostgreSQL client implementation
//!
//! This module provides the pooled client used by [`PostgresStore`](super::PostgresStore).

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{NaturalKey, RowApplyError, StoreError, TallyError};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::NoTls;

/// PostgreSQL client for Tally
///
/// Owns the connection pool. Every connection handed out has the configured
/// statement timeout applied.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// The pool connects lazily; use [`test_connection`](Self::test_connection)
    /// to verify reachability.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the pool
    /// cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self, TallyError> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                TallyError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| {
                TallyError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<(), StoreError> {
        let client = self.get_connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Connection(format!("Connection test failed: {e}")))?;

        tracing::info!(target = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Create the `timesheet_lines` table and its indexes if missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.get_connection().await?;
        let migration_sql = include_str!("../../../migrations/001_timesheet_lines.sql");
        client
            .batch_execute(migration_sql)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to execute migration: {e}")))?;

        tracing::info!("PostgreSQL schema initialized successfully");
        Ok(())
    }

    /// Get a connection from the pool with the statement timeout applied
    ///
    /// # Errors
    ///
    /// Pool exhaustion and connect failures are batch-fatal.
    pub async fn get_connection(&self) -> Result<Object, StoreError> {
        let client = self.pool.get().await.map_err(|e| {
            StoreError::Connection(format!("Failed to get connection from pool: {e}"))
        })?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client.batch_execute(&timeout_query).await.map_err(|e| {
            StoreError::Connection(format!("Failed to set statement timeout: {e}"))
        })?;

        Ok(client)
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact(self.config.connection_string.expose_secret().as_ref())
    }
}

fn redact(connection_string: &str) -> String {
    connection_string
        .rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| "postgresql://***".to_string())
}

/// Maps a driver error to the store taxonomy
///
/// SQLSTATE classes 22 (data exception) and 23 (integrity constraint
/// violation) concern one row; everything else, including a closed
/// connection or an error without SQLSTATE, is batch-fatal.
pub fn classify_error(err: &tokio_postgres::Error, key: &NaturalKey) -> StoreError {
    if err.is_closed() {
        return StoreError::Connection(format!("connection closed: {err}"));
    }

    let message = err
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| err.to_string());

    match err.code().map(|state| state.code()) {
        Some(code) if code.starts_with("23") || code.starts_with("22") => {
            RowApplyError::Constraint(format!("{key}: {message} (SQLSTATE {code})")).into()
        }
        Some(code) => StoreError::Connection(format!("{message} (SQLSTATE {code})")),
        None => StoreError::Connection(message),
    }
}
