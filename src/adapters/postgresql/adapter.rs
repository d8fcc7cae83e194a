//! PostgreSQL adapter implementing the store traits
//!
//! Transactions are driven with explicit `BEGIN`/`COMMIT` on a pooled
//! connection so they can be boxed as [`StoreTransaction`]. Each row runs
//! inside a savepoint, which keeps the transaction usable after a row-level
//! failure.

use crate::adapters::database::traits::{Store, StoreTransaction};
use crate::adapters::postgresql::client::{classify_error, PostgreSQLClient};
use crate::adapters::postgresql::models::{PgTimesheetLine, SELECT_COLUMNS};
use crate::domain::{
    ChangeEntry, ChangeKind, PersistedSnapshot, RowApplyError, ScopeWindow, StoreError,
};
use async_trait::async_trait;
use deadpool_postgres::Object;
use std::sync::Arc;

const INSERT_LINE: &str = r#"
    INSERT INTO timesheet_lines (
        work_date, employee_key, project_key, employee_name, project_id,
        working_hours, role, location, status, source_file, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now())
"#;

const UPDATE_LINE: &str = r#"
    UPDATE timesheet_lines
    SET employee_name = $4,
        project_id = $5,
        working_hours = $6,
        role = $7,
        location = $8,
        status = $9,
        source_file = $10,
        updated_at = now()
    WHERE work_date = $1 AND employee_key = $2 AND project_key = $3
      AND updated_at = $11
"#;

const LINE_EXISTS: &str = r#"
    SELECT 1 FROM timesheet_lines
    WHERE work_date = $1 AND employee_key = $2 AND project_key = $3
"#;

/// PostgreSQL implementation of [`Store`]
pub struct PostgresStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        self.client.test_connection().await
    }

    async fn fetch_persisted(&self, scope: &ScopeWindow) -> Result<PersistedSnapshot, StoreError> {
        let conn = self.client.get_connection().await?;
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM timesheet_lines \
             WHERE work_date BETWEEN $1 AND $2 \
             ORDER BY work_date, employee_key, project_key"
        );
        let rows = conn
            .query(&query, &[&scope.start, &scope.end])
            .await
            .map_err(|e| StoreError::Connection(format!("Snapshot query failed: {e}")))?;

        let mut snapshot = PersistedSnapshot::new();
        for row in &rows {
            let line = PgTimesheetLine::from_row(row)
                .map_err(|e| StoreError::Connection(format!("Unexpected row shape: {e}")))?;
            match line.into_persisted() {
                Some(record) => {
                    snapshot.insert(record.key.clone(), record);
                }
                None => tracing::warn!("Skipping persisted row with blank key columns"),
            }
        }

        tracing::debug!(rows = snapshot.len(), scope = %scope, "Fetched persisted snapshot");
        Ok(snapshot)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to begin transaction: {e}")))?;
        Ok(Box::new(PgTransaction { conn: Some(conn) }))
    }

    fn backend_name(&self) -> &str {
        "postgresql"
    }
}

/// An open transaction on a pooled connection
struct PgTransaction {
    conn: Option<Object>,
}

impl PgTransaction {
    fn conn(&self) -> Result<&Object, StoreError> {
        self.conn
            .as_ref()
            .ok_or_else(|| StoreError::Connection("transaction already finished".to_string()))
    }

    async fn write(&self, entry: &ChangeEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let after = entry.after.as_ref().ok_or_else(|| {
            RowApplyError::Constraint(format!("{} entry for {} has no new row", entry.kind, entry.key))
        })?;
        let line = PgTimesheetLine::from_record(after);

        match entry.kind {
            ChangeKind::Insert => {
                conn.execute(
                    INSERT_LINE,
                    &[
                        &line.work_date,
                        &line.employee_key,
                        &line.project_key,
                        &line.employee_name,
                        &line.project_id,
                        &line.working_hours,
                        &line.role,
                        &line.location,
                        &line.status,
                        &line.source_file,
                    ],
                )
                .await
                .map_err(|e| classify_error(&e, &entry.key))?;
                Ok(())
            }
            ChangeKind::Update => {
                let marker = entry
                    .before
                    .as_ref()
                    .map(|b| b.last_modified)
                    .ok_or_else(|| RowApplyError::Conflict(entry.key.to_string()))?;
                let updated = conn
                    .execute(
                        UPDATE_LINE,
                        &[
                            &line.work_date,
                            &line.employee_key,
                            &line.project_key,
                            &line.employee_name,
                            &line.project_id,
                            &line.working_hours,
                            &line.role,
                            &line.location,
                            &line.status,
                            &line.source_file,
                            &marker,
                        ],
                    )
                    .await
                    .map_err(|e| classify_error(&e, &entry.key))?;
                if updated == 1 {
                    return Ok(());
                }

                let exists = conn
                    .query_opt(LINE_EXISTS, &[&line.work_date, &line.employee_key, &line.project_key])
                    .await
                    .map_err(|e| classify_error(&e, &entry.key))?;
                match exists {
                    Some(_) => Err(RowApplyError::Conflict(entry.key.to_string()).into()),
                    None => Err(RowApplyError::NotFound(entry.key.to_string()).into()),
                }
            }
            ChangeKind::Unchanged | ChangeKind::Stale => Err(RowApplyError::Constraint(format!(
                "{} entries are not writes",
                entry.kind
            ))
            .into()),
        }
    }

    async fn finish(&mut self, statement: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| StoreError::Connection("transaction already finished".to_string()))?;
        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The session state is unknown; keep it out of the pool
                let _ = Object::take(conn);
                Err(StoreError::Connection(format!("{statement} failed: {e}")))
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn apply(&mut self, entry: &ChangeEntry) -> Result<(), StoreError> {
        self.conn()?
            .batch_execute("SAVEPOINT tally_row")
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to set savepoint: {e}")))?;

        match self.write(entry).await {
            Ok(()) => {
                self.conn()?
                    .batch_execute("RELEASE SAVEPOINT tally_row")
                    .await
                    .map_err(|e| StoreError::Connection(format!("Failed to release savepoint: {e}")))?;
                Ok(())
            }
            Err(StoreError::Row(row_err)) => {
                self.conn()?
                    .batch_execute("ROLLBACK TO SAVEPOINT tally_row")
                    .await
                    .map_err(|e| {
                        StoreError::Connection(format!("Failed to roll back savepoint: {e}"))
                    })?;
                Err(StoreError::Row(row_err))
            }
            Err(fatal) => Err(fatal),
        }
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Closing the connection makes the server roll the transaction back
            tracing::warn!("Transaction dropped without commit or rollback; discarding connection");
            let _ = Object::take(conn);
        }
    }
}
