//! Store abstraction layer
//!
//! This module provides the trait-based abstraction over the relational
//! store, allowing Tally to reconcile against PostgreSQL or an in-process map.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_store;
pub use memory::MemoryStore;
pub use traits::{Store, StoreTransaction};
