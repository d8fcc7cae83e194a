//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Human-readable console output
//! - JSON-formatted local log files with rotation
//! - Configurable log levels, overridable with `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use tally::logging::init_logging;
//! use tally::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(run_id = "abc", "Run started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use tally::log_stage_start;
///
/// log_stage_start!("extract");
/// ```
#[macro_export]
macro_rules! log_stage_start {
    ($stage:expr) => {
        tracing::info!(stage = $stage, "Stage started");
    };
}

/// Log the completion of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use tally::log_stage_complete;
/// use std::time::Duration;
///
/// log_stage_complete!("dedup", 42, Duration::from_millis(3));
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $count:expr, $duration:expr) => {
        tracing::info!(
            stage = $stage,
            count = $count,
            duration_ms = $duration.as_millis() as u64,
            "Stage completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use tally::log_error_with_context;
/// use tally::domain::TallyError;
///
/// let error = TallyError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[test]
    fn test_macros_expand() {
        crate::log_stage_start!("extract");
        crate::log_stage_complete!("extract", 3usize, Duration::from_millis(5));
        let error = crate::domain::TallyError::Other("boom".to_string());
        crate::log_error_with_context!(&error, "testing");
    }
}
