//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Tally using clap.
//!
//! Exit codes: 0 success, 1 success with warnings, 2 configuration error,
//! 4 connection error, 5 failed run, 130 interrupted.

pub mod commands;

use clap::{Parser, Subcommand};

/// Tally - Timesheet reconciliation engine
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
#[command(author = "Tally Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tally.toml", env = "TALLY_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TALLY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile spreadsheet timesheets against the store
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
