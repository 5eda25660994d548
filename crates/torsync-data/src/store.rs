//! Writer contract consumed by the synchronizer.

use std::collections::HashMap;

use async_trait::async_trait;
use torsync_core::{
    FileChanges, InfoHash, PersistedTorrent, TorrentChange, TorrentId, TorrentSnapshot,
};

use crate::error::Result;

/// Outcome of inserting a pending torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedTorrent {
    /// Surrogate id now bound to the info hash.
    pub id: TorrentId,
    /// `false` when the info hash already had a row and that row was kept.
    pub created: bool,
}

/// Rows touched by the shutdown correction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownCorrection {
    /// Rows whose active status was rewritten.
    pub statuses: u64,
    /// Rows whose peer counters were zeroed.
    pub peers: u64,
}

/// Transactional writer for the torrent projection.
///
/// Every method runs in its own scoped transaction; a failed statement rolls the
/// whole call back. Missing rows on update or delete are not errors.
#[async_trait]
pub trait TorrentStore: Send + Sync {
    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Insert a batch of pending torrents and their file rows in one transaction.
    ///
    /// An info hash that already has a row keeps that row and reports its id
    /// with `created = false`.
    async fn insert_pending(
        &self,
        batch: &[TorrentSnapshot],
    ) -> Result<HashMap<InfoHash, InsertedTorrent>>;

    /// Load persisted torrents and their file rows by info hash. Unknown hashes are omitted.
    async fn find_torrents(&self, hashes: &[InfoHash]) -> Result<Vec<PersistedTorrent>>;

    /// Update only the changed torrent columns. Empty changes issue no statement.
    async fn apply_torrent_changes(&self, id: TorrentId, change: &TorrentChange) -> Result<()>;

    /// Update changed file columns; complete changes for missing rows insert them.
    async fn apply_file_changes(&self, id: TorrentId, changes: &FileChanges) -> Result<()>;

    /// Delete a torrent row and all of its file rows. Returns whether a row existed.
    async fn remove(&self, info_hash: &InfoHash) -> Result<bool>;

    /// Rewrite save path and name immediately after a storage move.
    async fn update_save_path(&self, id: TorrentId, new_path: &str, new_name: &str)
    -> Result<()>;

    /// Pause active statuses and zero peer counters on every row.
    async fn correct_statuses_on_shutdown(&self) -> Result<ShutdownCorrection>;
}
