//! Engine-facing entry points.
//!
//! # Design
//! - Engine callbacks hand over borrowed views; the handle captures owned
//!   snapshots before anything crosses into the worker.
//! - Enqueueing never blocks so callbacks can run on engine threads.

use tokio::sync::mpsc::UnboundedSender;
use torsync_core::{EngineEvent, InfoHash, TorrentSnapshot, TorrentView};

use crate::command::SyncCommand;
use crate::error::{SyncError, SyncResult};

/// Cloneable handle that marshals engine notifications into the worker queue.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub(crate) const fn new(commands: UnboundedSender<SyncCommand>) -> Self {
        Self { commands }
    }

    /// A torrent was added to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRunning`] when the worker has stopped.
    pub fn on_added<V: TorrentView + ?Sized>(&self, view: &V) -> SyncResult<()> {
        self.dispatch(EngineEvent::TorrentAdded {
            torrent: TorrentSnapshot::capture(view),
        })
    }

    /// A torrent was removed from the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRunning`] when the worker has stopped.
    pub fn on_deleted(&self, info_hash: &InfoHash) -> SyncResult<()> {
        self.dispatch(EngineEvent::TorrentDeleted {
            info_hash: info_hash.clone(),
        })
    }

    /// One or more torrents reported fresh state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRunning`] when the worker has stopped.
    pub fn on_updated<'a, I, V>(&self, views: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = &'a V>,
        V: TorrentView + ?Sized + 'a,
    {
        self.dispatch(EngineEvent::TorrentsUpdated {
            torrents: views.into_iter().map(TorrentSnapshot::capture::<V>).collect(),
        })
    }

    /// A torrent finished moving its payload to `new_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRunning`] when the worker has stopped.
    pub fn on_storage_moved<V: TorrentView + ?Sized>(
        &self,
        view: &V,
        new_path: &str,
    ) -> SyncResult<()> {
        self.dispatch(EngineEvent::StorageMoved {
            torrent: TorrentSnapshot::capture(view),
            new_path: new_path.to_string(),
        })
    }

    /// The engine is shutting down.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRunning`] when the worker has stopped.
    pub fn on_shutdown(&self) -> SyncResult<()> {
        self.dispatch(EngineEvent::EngineShutdown)
    }

    /// Enqueue an already captured event.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRunning`] when the worker has stopped.
    pub fn dispatch(&self, event: EngineEvent) -> SyncResult<()> {
        let kind = event.kind();
        self.commands
            .send(SyncCommand::Event(event))
            .map_err(|_| SyncError::NotRunning { event: kind })
    }

    /// Whether the worker has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub(crate) fn request_stop(&self) -> bool {
        self.commands.send(SyncCommand::Stop).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use torsync_test_support::fixtures::{hash, snapshot};

    #[test]
    fn views_are_captured_into_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = SyncHandle::new(tx);
        let first = snapshot(1, 1);
        let second = snapshot(2, 0);

        assert!(handle.on_added(&first).is_ok());
        assert!(handle.on_updated([&first, &second]).is_ok());
        assert!(handle.on_storage_moved(&second, "/moved").is_ok());
        assert!(handle.on_deleted(&hash(1)).is_ok());

        let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|command| match command {
                SyncCommand::Event(event) => event.kind(),
                SyncCommand::Stop => "stop",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "torrent_added",
                "torrents_updated",
                "storage_moved",
                "torrent_deleted"
            ]
        );
    }

    #[test]
    fn closed_queue_is_a_contract_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = SyncHandle::new(tx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.on_shutdown(),
            Err(SyncError::NotRunning {
                event: "engine_shutdown"
            })
        ));
    }
}
