//! PostgreSQL store integration
//!
//! This module provides the pooled client, the row models and the
//! [`Store`](crate::adapters::database::Store) implementation backed by the
//! `timesheet_lines` table.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgresStore;
pub use client::PostgreSQLClient;
pub use models::PgTimesheetLine;
