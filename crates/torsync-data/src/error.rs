//! Error types for the data access layer.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use torsync_core::CoreError;

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised by the data access layer.
#[derive(Debug)]
pub enum DataError {
    /// Migration execution failed.
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A stored row could not be mapped back onto the domain model.
    CorruptRow {
        /// Operation identifier.
        operation: &'static str,
        /// Column holding the offending value.
        column: &'static str,
        /// Domain parsing error.
        source: CoreError,
    },
}

impl DataError {
    /// Build a closure that wraps a `sqlx` error for `operation`.
    pub fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::QueryFailed { operation, source }
    }

    /// Operation identifier carried by the error, when there is one.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::MigrationFailed { .. } => None,
            Self::QueryFailed { operation, .. } | Self::CorruptRow { operation, .. } => {
                Some(*operation)
            }
        }
    }
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrationFailed { .. } => formatter.write_str("migration failed"),
            Self::QueryFailed { .. } => formatter.write_str("database operation failed"),
            Self::CorruptRow { .. } => formatter.write_str("stored row could not be decoded"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MigrationFailed { source } => Some(source),
            Self::QueryFailed { source, .. } => Some(source),
            Self::CorruptRow { source, .. } => Some(source),
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: "sqlx operation",
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_display_and_source() {
        let migration = DataError::MigrationFailed {
            source: sqlx::migrate::MigrateError::VersionMissing(1),
        };
        assert_eq!(migration.to_string(), "migration failed");
        assert!(migration.source().is_some());
        assert_eq!(migration.operation(), None);

        let query = DataError::query("insert_pending")(sqlx::Error::PoolTimedOut);
        assert_eq!(query.to_string(), "database operation failed");
        assert_eq!(query.operation(), Some("insert_pending"));
        assert!(query.source().is_some());

        let corrupt = DataError::CorruptRow {
            operation: "find_torrents",
            column: "status",
            source: CoreError::UnknownStatusCode { code: 42 },
        };
        assert_eq!(corrupt.to_string(), "stored row could not be decoded");
        assert!(corrupt.source().is_some());

        let from = DataError::from(sqlx::Error::RowNotFound);
        assert_eq!(from.operation(), Some("sqlx operation"));
    }
}
