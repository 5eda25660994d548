//! Fallback values applied when a variable is unset.

use std::time::Duration;

/// Base interval between commit cycles.
pub const COMMIT_INTERVAL: Duration = Duration::from_millis(1_000);
/// Upper bound the commit interval may widen to after failures.
pub const COMMIT_INTERVAL_MAX: Duration = Duration::from_millis(5_000);
/// Default pool size for the database connection.
pub const DB_MAX_CONNECTIONS: u32 = 5;
/// Default tracing filter.
pub const LOG_LEVEL: &str = "info";
