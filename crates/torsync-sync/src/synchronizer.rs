//! Explicit start/stop lifecycle around the worker task.

use std::sync::Arc;

use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use torsync_config::SyncSettings;
use torsync_core::{NoticeBus, NoticeEnvelope};
use torsync_data::TorrentStore;
use torsync_telemetry::Metrics;
use tracing::info;

use crate::adapter::SyncHandle;
use crate::error::{SyncError, SyncResult};
use crate::worker::{self, Worker};

enum Lifecycle {
    Idle,
    Running {
        handle: SyncHandle,
        join: JoinHandle<()>,
    },
    Stopped,
}

/// Owns the worker that keeps the database projection in step with the engine.
///
/// Built once by the composition root; [`Synchronizer::start`] spawns the
/// worker on the current tokio runtime and [`Synchronizer::stop`] runs the
/// final commit plus shutdown correction before returning.
pub struct Synchronizer {
    store: Arc<dyn TorrentStore>,
    settings: SyncSettings,
    metrics: Metrics,
    notices: NoticeBus,
    lifecycle: Lifecycle,
}

impl Synchronizer {
    /// Build an idle synchronizer.
    #[must_use]
    pub fn new(store: Arc<dyn TorrentStore>, settings: SyncSettings, metrics: Metrics) -> Self {
        Self {
            store,
            settings,
            metrics,
            notices: NoticeBus::new(),
            lifecycle: Lifecycle::Idle,
        }
    }

    /// Spawn the worker and return an engine-facing handle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyStarted`] or [`SyncError::AlreadyStopped`]
    /// when called outside the idle state.
    pub fn start(&mut self) -> SyncResult<SyncHandle> {
        match self.lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running { .. } => return Err(SyncError::AlreadyStarted),
            Lifecycle::Stopped => return Err(SyncError::AlreadyStopped),
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = Worker::new(
            Arc::clone(&self.store),
            &self.settings,
            self.notices.clone(),
            self.metrics.clone(),
        );
        let join = worker::spawn(worker, receiver);
        let handle = SyncHandle::new(commands);
        info!(
            base_interval_ms = u64::try_from(self.settings.base_interval.as_millis())
                .unwrap_or(u64::MAX),
            max_interval_ms =
                u64::try_from(self.settings.max_interval.as_millis()).unwrap_or(u64::MAX),
            "synchronizer started"
        );
        self.lifecycle = Lifecycle::Running {
            handle: handle.clone(),
            join,
        };
        Ok(handle)
    }

    /// Another handle onto the running worker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotStarted`] before `start` and
    /// [`SyncError::AlreadyStopped`] after `stop`.
    pub fn handle(&self) -> SyncResult<SyncHandle> {
        match &self.lifecycle {
            Lifecycle::Running { handle, .. } => Ok(handle.clone()),
            Lifecycle::Idle => Err(SyncError::NotStarted),
            Lifecycle::Stopped => Err(SyncError::AlreadyStopped),
        }
    }

    /// Subscribe to database-side notices.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<NoticeEnvelope> {
        self.notices.subscribe()
    }

    /// Whether the worker is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// Drain queued events, run the final commit and shutdown correction, and
    /// wait for the worker to exit. Pending ticks are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotStarted`] before `start`,
    /// [`SyncError::AlreadyStopped`] on a second call, and
    /// [`SyncError::WorkerFailed`] when the worker task panicked.
    pub async fn stop(&mut self) -> SyncResult<()> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle => {
                self.lifecycle = Lifecycle::Idle;
                Err(SyncError::NotStarted)
            }
            Lifecycle::Stopped => Err(SyncError::AlreadyStopped),
            Lifecycle::Running { handle, join } => {
                if !handle.request_stop() {
                    info!("synchronizer worker already exited");
                }
                join.await
                    .map_err(|source| SyncError::WorkerFailed { source })?;
                info!("synchronizer stopped");
                Ok(())
            }
        }
    }
}
