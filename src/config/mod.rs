//! Configuration management for Tally.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Tally uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `TALLY_*` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tally::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tally.toml")?;
//! println!("Folders: {:?}", config.extractor.folders);
//! println!("Dedup enabled: {}", config.dedup.enabled);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [scope]
//! current_month = false
//! start_date = "2025-01-01"
//! end_date = "2025-03-31"
//!
//! [extractor]
//! folders = ["/srv/timesheets"]
//!
//! [store]
//! kind = "postgresql"
//!
//! [postgresql]
//! connection_string = "${TALLY_DATABASE_URL}"
//!
//! [report]
//! problematic_statuses = ["Pending", "To Review"]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, ColumnsConfig, DedupConfig, ExtractorConfig, LoggingConfig,
    NormalizeConfig, NotifierKind, NotifyConfig, PostgreSQLConfig, ReportConfig, ScopeConfig,
    StoreConfig, StoreKind, TallyConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
