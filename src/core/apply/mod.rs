//! Change planning and application
//!
//! [`WritePlan`] separates the entries that require a store write from the
//! ones that do not; [`Applier`] applies the writes in one transaction.

pub mod applier;
pub mod plan;

pub use applier::{ApplyReport, Applier};
pub use plan::WritePlan;
