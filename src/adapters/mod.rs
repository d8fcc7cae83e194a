//! External system integrations for Tally.
//!
//! This module provides adapters for the systems a reconciliation run talks to:
//!
//! - [`excel`] - Workbook discovery and sheet extraction
//! - [`database`] - Store abstraction layer (trait-based) and in-memory store
//! - [`postgresql`] - PostgreSQL store implementation
//! - [`notifier`] - Run report delivery
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits ([`excel::Extractor`],
//! [`database::Store`], [`notifier::Notifier`]) so the pipeline can be driven
//! by test doubles.
//!
//! # Memory Store
//!
//! ```rust
//! use tally::adapters::database::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! assert_eq!(store.backend_name(), "memory");
//! assert!(store.is_empty());
//! ```

pub mod database;
pub mod excel;
pub mod notifier;
pub mod postgresql;
