//! Workbook discovery
//!
//! Walks the configured folders and collects workbook files, skipping Office
//! lock files and excluded folder names.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ExtractorConfig;
use crate::domain::ExtractionError;

/// Prefix Office uses for lock files next to an open workbook
const LOCK_FILE_PREFIX: &str = "~$";

/// Filters applied while walking folders
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    excluded_folders: Vec<String>,
    extensions: Vec<String>,
}

impl DiscoveryRules {
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            excluded_folders: config
                .excluded_folders
                .iter()
                .map(|f| f.trim().to_lowercase())
                .collect(),
            extensions: config
                .file_extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_excluded_dir(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.excluded_folders.contains(&name.to_lowercase()))
            .unwrap_or(false)
    }

    fn is_workbook(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with(LOCK_FILE_PREFIX) {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Recursively collects workbooks under `folders`, sorted by path
///
/// Symbolic links are not followed. Missing folders and unreadable entries
/// are logged and skipped. Fails only when none of the configured folders
/// exists.
pub fn discover(folders: &[String], rules: &DiscoveryRules) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut found = Vec::new();
    let mut existing_roots = 0;

    for folder in folders {
        let root = Path::new(folder);
        if !root.is_dir() {
            tracing::warn!(folder = %root.display(), "Configured folder does not exist");
            continue;
        }
        existing_roots += 1;

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            let excluded = entry.depth() > 0
                && entry.file_type().is_dir()
                && rules.is_excluded_dir(entry.path());
            if excluded {
                tracing::debug!(folder = %entry.path().display(), "Skipping excluded folder");
            }
            !excluded
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot read folder entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && rules.is_workbook(entry.path()) {
                found.push(entry.into_path());
            }
        }
    }

    if existing_roots == 0 {
        return Err(ExtractionError::SourceNotFound(folders.join(", ")));
    }

    found.sort();
    found.dedup();
    Ok(found)
}
