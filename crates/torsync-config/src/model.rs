//! Typed configuration models.

use std::time::Duration;

use serde::Serialize;

use crate::defaults;

/// Runtime tuning for the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSettings {
    /// Interval between commit cycles while the database is healthy.
    pub base_interval: Duration,
    /// Ceiling for the interval after repeated failures.
    pub max_interval: Duration,
    /// Emit a debug event for every applied torrent/file change.
    pub log_changes: bool,
    /// Lowercase file extensions to persist; empty persists every file.
    pub previewable_extensions: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_interval: defaults::COMMIT_INTERVAL,
            max_interval: defaults::COMMIT_INTERVAL_MAX,
            log_changes: false,
            previewable_extensions: Vec::new(),
        }
    }
}

/// Process-wide configuration assembled at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    #[serde(skip_serializing)]
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Synchronizer tuning.
    pub sync: SyncSettings,
    /// Tracing filter directive.
    pub log_level: String,
    /// Requested log format name, if any.
    pub log_format: Option<String>,
}
