//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{NotifierKind, PostgreSQLConfig, StoreKind, TallyConfig};
use super::secret::secret_string;
use crate::domain::errors::TallyError;
use crate::domain::result::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into TallyConfig
/// 4. Applies environment variable overrides (TALLY_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`TallyError::Configuration`] if the file cannot be read or
/// parsed, a referenced variable is unset, an override is malformed, or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use tally::config::loader::load_config;
///
/// let config = load_config("tally.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TallyConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TallyError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        TallyError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: TallyConfig = toml::from_str(&contents)
        .map_err(|e| TallyError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        TallyError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| TallyError::Other(format!("invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(TallyError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        TallyError::Configuration(format!("Invalid value '{value}' for {name}"))
    })
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Applies environment variable overrides using TALLY_* prefix
///
/// Environment variables follow the pattern: TALLY_<SECTION>_<KEY>,
/// for example TALLY_SCOPE_START_DATE or TALLY_STORE_KIND.
fn apply_env_overrides(config: &mut TallyConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env("TALLY_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env("TALLY_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_env("TALLY_APPLICATION_DRY_RUN", &val)?;
    }

    // Scope overrides
    if let Some(val) = env("TALLY_SCOPE_CURRENT_MONTH") {
        config.scope.current_month = parse_env("TALLY_SCOPE_CURRENT_MONTH", &val)?;
    }
    if let Some(val) = env("TALLY_SCOPE_START_DATE") {
        config.scope.start_date = Some(parse_env::<NaiveDate>("TALLY_SCOPE_START_DATE", &val)?);
    }
    if let Some(val) = env("TALLY_SCOPE_END_DATE") {
        config.scope.end_date = Some(parse_env::<NaiveDate>("TALLY_SCOPE_END_DATE", &val)?);
    }

    // Extractor overrides
    if let Some(val) = env("TALLY_EXTRACTOR_FOLDERS") {
        config.extractor.folders = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(val) = env("TALLY_EXTRACTOR_SHEET_NAME") {
        config.extractor.sheet_name = val;
    }

    // Dedup overrides
    if let Some(val) = env("TALLY_DEDUP_ENABLED") {
        config.dedup.enabled = parse_env("TALLY_DEDUP_ENABLED", &val)?;
    }

    // Store overrides
    if let Some(val) = env("TALLY_STORE_KIND") {
        config.store.kind = match val.trim().to_lowercase().as_str() {
            "postgresql" => StoreKind::PostgreSQL,
            "memory" => StoreKind::Memory,
            other => {
                return Err(TallyError::Configuration(format!(
                    "Invalid value '{other}' for TALLY_STORE_KIND"
                )))
            }
        };
    }
    if let Some(val) = env("TALLY_STORE_TIMEOUT_SECONDS") {
        config.store.timeout_seconds = parse_env("TALLY_STORE_TIMEOUT_SECONDS", &val)?;
    }

    // PostgreSQL overrides; a connection string alone is enough to create the section
    if let Some(val) = env("TALLY_POSTGRESQL_CONNECTION_STRING") {
        match config.postgresql.as_mut() {
            Some(pg) => pg.connection_string = secret_string(val),
            None => {
                let section = format!("connection_string = {}", toml::Value::String(val));
                let pg: PostgreSQLConfig = toml::from_str(&section).map_err(|e| {
                    TallyError::Configuration(format!("Invalid TALLY_POSTGRESQL_CONNECTION_STRING: {e}"))
                })?;
                config.postgresql = Some(pg);
            }
        }
    }
    if let Some(pg) = config.postgresql.as_mut() {
        if let Some(val) = env("TALLY_POSTGRESQL_MAX_CONNECTIONS") {
            pg.max_connections = parse_env("TALLY_POSTGRESQL_MAX_CONNECTIONS", &val)?;
        }
    }

    // Notify overrides
    if let Some(val) = env("TALLY_NOTIFY_KIND") {
        config.notify.kind = match val.trim().to_lowercase().as_str() {
            "log" => NotifierKind::Log,
            "file" => NotifierKind::File,
            other => {
                return Err(TallyError::Configuration(format!(
                    "Invalid value '{other}' for TALLY_NOTIFY_KIND"
                )))
            }
        };
    }
    if let Some(val) = env("TALLY_NOTIFY_DIRECTORY") {
        config.notify.directory = Some(val);
    }

    // Logging overrides
    if let Some(val) = env("TALLY_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("TALLY_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = env("TALLY_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
