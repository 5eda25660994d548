//! Lifecycle errors for the synchronizer.

use thiserror::Error;
use tokio::task::JoinError;

/// Result alias for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Contract violations and worker failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// `start` was called on a synchronizer that already started.
    #[error("synchronizer already started")]
    AlreadyStarted,
    /// An operation that needs a running worker ran before `start`.
    #[error("synchronizer not started")]
    NotStarted,
    /// `stop` or `start` was called after the synchronizer stopped.
    #[error("synchronizer already stopped")]
    AlreadyStopped,
    /// The worker task is gone; the event was not accepted.
    #[error("synchronizer worker is not running")]
    NotRunning {
        /// Kind of the rejected event.
        event: &'static str,
    },
    /// The worker task panicked or was cancelled.
    #[error("synchronizer worker failed")]
    WorkerFailed {
        /// Join failure reported by tokio.
        #[source]
        source: JoinError,
    },
}
