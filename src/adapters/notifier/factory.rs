//! Notifier factory

use std::sync::Arc;

use super::{FileNotifier, LogNotifier, Notifier};
use crate::config::{NotifierKind, NotifyConfig};
use crate::domain::NotifyError;

/// Create a notifier based on the configuration
pub fn create_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier + Send + Sync>, NotifyError> {
    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier::new())),
        NotifierKind::File => {
            let directory = config
                .directory
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .ok_or_else(|| {
                    NotifyError::Configuration(
                        "notify.directory is required for the file notifier".to_string(),
                    )
                })?;
            Ok(Arc::new(FileNotifier::new(directory)))
        }
    }
}
