//! PostgreSQL row models
//!
//! This module maps rows of the `timesheet_lines` table to domain records.

use crate::domain::{NaturalKey, NormalizedRecord, PersistedRecord};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio_postgres::Row;

/// Columns selected for a snapshot, in [`PgTimesheetLine::from_row`] order
pub const SELECT_COLUMNS: &str = "work_date, employee_key, project_key, employee_name, \
     project_id, working_hours, role, location, status, source_file, updated_at";

/// One row of `timesheet_lines`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTimesheetLine {
    pub work_date: NaiveDate,
    pub employee_key: String,
    pub project_key: String,
    pub employee_name: String,
    pub project_id: String,
    pub working_hours: Decimal,
    pub role: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub source_file: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PgTimesheetLine {
    /// Reads a row selected with [`SELECT_COLUMNS`]
    pub fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            work_date: row.try_get(0)?,
            employee_key: row.try_get(1)?,
            project_key: row.try_get(2)?,
            employee_name: row.try_get(3)?,
            project_id: row.try_get(4)?,
            working_hours: row.try_get(5)?,
            role: row.try_get(6)?,
            location: row.try_get(7)?,
            status: row.try_get(8)?,
            source_file: row.try_get(9)?,
            updated_at: row.try_get(10)?,
        })
    }

    /// Builds the row to write for `record`
    ///
    /// `updated_at` is assigned by the database on write.
    pub fn from_record(record: &NormalizedRecord) -> Self {
        Self {
            work_date: record.key.date,
            employee_key: record.key.employee.clone(),
            project_key: record.key.project.clone(),
            employee_name: record.employee_name.clone(),
            project_id: record.project_id.clone(),
            working_hours: record.working_hours,
            role: record.role.clone(),
            location: record.location.clone(),
            status: record.status.clone(),
            source_file: Some(record.source.to_string()),
            updated_at: record.extracted_at,
        }
    }

    /// Converts to a domain record
    ///
    /// Returns `None` for rows whose key columns are blank, which the schema
    /// forbids but a hand-edited table may still contain.
    pub fn into_persisted(self) -> Option<PersistedRecord> {
        let key = NaturalKey::new(self.work_date, &self.employee_key, &self.project_key)?;
        Some(PersistedRecord {
            key,
            employee_name: self.employee_name,
            project_id: self.project_id,
            working_hours: self.working_hours,
            role: self.role,
            location: self.location,
            status: self.status,
            source: self.source_file,
            last_modified: self.updated_at,
        })
    }
}
