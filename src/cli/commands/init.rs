//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "tally.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing Tally configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} and list your timesheet folders", self.output);
                println!("  2. Set TALLY_DATABASE_URL in the environment or a .env file");
                println!("  3. Validate configuration: tally validate-config");
                println!("  4. Preview changes: tally reconcile --dry-run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Tally Configuration File
# Timesheet reconciliation engine

[application]
log_level = "info"
dry_run = false

[scope]
current_month = true

[extractor]
folders = ["/srv/timesheets"]
sheet_name = "Database"

[store]
kind = "postgresql"  # postgresql | memory

[postgresql]
connection_string = "${TALLY_DATABASE_URL}"

[notify]
kind = "log"  # log | file

[logging]
local_enabled = true
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Tally Configuration File
# Timesheet reconciliation engine
#
# Any value may reference an environment variable as ${NAME}. Every option can
# also be overridden with TALLY_<SECTION>_<KEY>, e.g. TALLY_STORE_KIND=memory.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Plan and report changes without writing to the store
dry_run = false

# ============================================================================
# Scope Window
# ============================================================================
[scope]
# Reconcile the calendar month containing today; start/end dates are ignored
current_month = true

# Explicit inclusive window, used when current_month = false.
# A missing start defaults to January 1st, a missing end to December 31st.
# start_date = "2025-01-01"
# end_date = "2025-03-31"

# ============================================================================
# Workbook Extraction
# ============================================================================
[extractor]
# Folders searched recursively for workbooks
folders = ["/srv/timesheets"]

# Sheet holding the timesheet rows; its first row is the header
sheet_name = "Database"

# Folder names skipped while searching (case-insensitive)
excluded_folders = ["Template", "former_employees", "archive"]

# Workbook extensions
file_extensions = ["xlsx", "xlsm", "xls"]

# Timeout for reading one workbook
timeout_seconds = 30

# ============================================================================
# Column Headers
# ============================================================================
[columns]
date = "Date"
employee = "Employee Name"
project = "Project ID"
role = "Employee Role"
location = "Office Location"
hours = "Working Hours"
# Read when the hours column is empty
hours_converted = "Working Hours Converted"
status = "Status"

# ============================================================================
# Normalization
# ============================================================================
[normalize]
# Rows above this many hours are rejected
daily_hour_ceiling = 24

# Hours are rounded half away from zero to this many decimals
hours_scale = 2

# chrono formats for dates typed as text, tried in order
date_formats = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"]

# ============================================================================
# Deduplication
# ============================================================================
[dedup]
# true: keep the most recently saved record per key
# false: reject every record of a key that appears more than once
enabled = true

# ============================================================================
# Store
# ============================================================================
[store]
# postgresql | memory
kind = "postgresql"

# Timeout applied to every store call
timeout_seconds = 30

[postgresql]
# Connection string format: postgresql://[user[:password]@][host][:port][/dbname]
connection_string = "${TALLY_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60

# ============================================================================
# Reports
# ============================================================================
[report]
# Errors written to the log at the end of a run
max_log_errors = 10

# Errors included in the error report
max_notify_errors = 20

# Statuses that put a record on the management report (case-insensitive)
problematic_statuses = ["Incomplete", "Pending", "Error", "Missing", "To Review"]

[notify]
# log: reports go to the log; file: reports are written to `directory`
kind = "log"
# directory = "reports"

# Send the management report after runs that did not fail
management_report = true

timeout_seconds = 30

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable local JSON log files
local_enabled = true

# Local log directory
local_path = "logs"

# Log rotation (daily, hourly or never)
local_rotation = "daily"
"#
        .to_string()
    }
}
