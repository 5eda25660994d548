//! # Design
//!
//! - Centralize application-level errors for bootstrap and event intake.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: torsync_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: torsync_telemetry::TelemetryError,
    },
    /// Connecting to the database failed.
    #[error("database connection failed")]
    Database {
        /// Operation identifier.
        operation: &'static str,
        /// Source driver error.
        source: sqlx::Error,
    },
    /// Store setup failed.
    #[error("store operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: torsync_data::DataError,
    },
    /// Synchronizer lifecycle operations failed.
    #[error("synchronizer operation failed")]
    Sync {
        /// Operation identifier.
        operation: &'static str,
        /// Source synchronizer error.
        source: torsync_sync::SyncError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: torsync_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: torsync_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: torsync_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn sync(operation: &'static str, source: torsync_sync::SyncError) -> Self {
        Self::Sync { operation, source }
    }

    pub(crate) const fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            torsync_config::ConfigError::Missing {
                name: "TORSYNC_DATABASE_URL",
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let database = AppError::database("pool.connect", sqlx::Error::PoolTimedOut);
        assert_eq!(database.to_string(), "database connection failed");

        let data = AppError::data(
            "store.new",
            torsync_data::DataError::from(sqlx::Error::PoolClosed),
        );
        assert!(matches!(data, AppError::Data { .. }));

        let sync = AppError::sync("sync.start", torsync_sync::SyncError::AlreadyStarted);
        assert_eq!(sync.to_string(), "synchronizer operation failed");

        let io = AppError::io("stdin.read", io::Error::other("closed"));
        assert!(io.source().is_some());
    }
}
