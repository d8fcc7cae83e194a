//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Tally configuration file.

use crate::adapters::postgresql::PostgreSQLClient;
use crate::config::{load_config, NotifierKind, StoreKind};
use chrono::Local;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// `load_config` validates as part of loading, so any failure here is a
    /// configuration error.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Scope: {}",
            config.scope.window(Local::now().date_naive())
        );
        println!("  Folders: {:?}", config.extractor.folders);
        println!("  Sheet: {}", config.extractor.sheet_name);
        println!("  Deduplication: {}", config.dedup.enabled);
        println!("  Hour Ceiling: {}", config.normalize.daily_hour_ceiling);

        match config.store.kind {
            StoreKind::Memory => println!("  Store: in-memory"),
            StoreKind::PostgreSQL => {
                if let Some(pg_config) = config.postgresql.clone() {
                    println!("  Store: PostgreSQL");
                    match PostgreSQLClient::new(pg_config.clone()) {
                        Ok(client) => {
                            println!("  PostgreSQL Connection: {}", client.connection_string_safe())
                        }
                        Err(e) => println!("  PostgreSQL Connection: invalid ({e})"),
                    }
                    println!("  Max Connections: {}", pg_config.max_connections);
                }
            }
        }

        match config.notify.kind {
            NotifierKind::Log => println!("  Notifier: log"),
            NotifierKind::File => println!(
                "  Notifier: file ({})",
                config.notify.directory.as_deref().unwrap_or_default()
            ),
        }
        println!();
        Ok(0)
    }
}
