//! In-memory [`TorrentStore`] with a call log, a connectivity switch, and
//! one-shot failure injection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use torsync_core::{
    CoreError, FileAttributes, FileChanges, InfoHash, PersistedTorrent, TorrentAttributes, TorrentChange,
    TorrentField, TorrentId, TorrentRecord, TorrentSnapshot,
};
use torsync_data::{DataError, DataResult, InsertedTorrent, ShutdownCorrection, TorrentStore};

/// A writer call as observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `ping`.
    Ping,
    /// `insert_pending` with the batch's hashes in order.
    InsertPending(Vec<InfoHash>),
    /// `find_torrents`.
    FindTorrents(Vec<InfoHash>),
    /// `apply_torrent_changes`.
    ApplyTorrentChanges(TorrentId, TorrentChange),
    /// `apply_file_changes`.
    ApplyFileChanges(TorrentId, FileChanges),
    /// `remove`.
    Remove(InfoHash),
    /// `update_save_path` with path and name.
    UpdateSavePath(TorrentId, String, String),
    /// `correct_statuses_on_shutdown`.
    CorrectStatuses,
}

impl StoreCall {
    /// Operation name matching the Postgres writer's error labels.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::InsertPending(_) => "insert_pending",
            Self::FindTorrents(_) => "find_torrents",
            Self::ApplyTorrentChanges(..) => "apply_torrent_changes",
            Self::ApplyFileChanges(..) => "apply_file_changes",
            Self::Remove(_) => "remove",
            Self::UpdateSavePath(..) => "update_save_path",
            Self::CorrectStatuses => "correct_statuses_on_shutdown",
        }
    }

    /// Whether the call mutates stored rows.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Ping | Self::FindTorrents(_))
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    rows: HashMap<InfoHash, (TorrentId, TorrentAttributes)>,
    files: HashMap<TorrentId, BTreeMap<u32, FileAttributes>>,
    calls: Vec<StoreCall>,
    disconnected: bool,
    failures: HashSet<&'static str>,
    poisoned: HashSet<InfoHash>,
}

impl MemoryState {
    fn allocate(&mut self) -> TorrentId {
        self.next_id += 1;
        TorrentId(self.next_id)
    }

    fn check_poisoned(&self, id: TorrentId, operation: &'static str) -> DataResult<()> {
        match self.hash_of(id) {
            Some(hash) if self.poisoned.contains(&hash) => Err(DataError::QueryFailed {
                operation,
                source: sqlx::Error::PoolTimedOut,
            }),
            _ => Ok(()),
        }
    }

    fn hash_of(&self, id: TorrentId) -> Option<InfoHash> {
        self.rows
            .iter()
            .find(|(_, (row_id, _))| *row_id == id)
            .map(|(hash, _)| hash.clone())
    }
}

/// Thread-safe in-memory writer.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty, connected store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggle simulated connectivity. While disconnected every call fails.
    pub fn set_connected(&self, connected: bool) {
        self.lock().disconnected = !connected;
    }

    /// Make the next call to `operation` fail once.
    pub fn fail_next(&self, operation: &'static str) {
        self.lock().failures.insert(operation);
    }

    /// Make every lookup or update touching `hash` fail until the store is dropped.
    /// Lookups report a corrupt row; updates report a query failure.
    pub fn poison(&self, hash: &InfoHash) {
        self.lock().poisoned.insert(hash.clone());
    }

    /// Insert a row directly, as if it survived from an earlier process.
    pub fn seed(&self, snapshot: &TorrentSnapshot) -> TorrentId {
        let mut state = self.lock();
        let id = state.allocate();
        state
            .rows
            .insert(snapshot.info_hash.clone(), (id, snapshot.attributes.clone()));
        state.files.insert(
            id,
            snapshot
                .files
                .iter()
                .map(|file| (file.index, file.attributes.clone()))
                .collect(),
        );
        id
    }

    /// Every call observed so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Calls that mutate rows.
    #[must_use]
    pub fn writes(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Stored torrent row and files for `hash`.
    #[must_use]
    pub fn torrent(&self, hash: &InfoHash) -> Option<PersistedTorrent> {
        let state = self.lock();
        state.rows.get(hash).map(|(id, attributes)| PersistedTorrent {
            record: TorrentRecord {
                id: *id,
                info_hash: hash.clone(),
                attributes: attributes.clone(),
            },
            files: state.files.get(id).cloned().unwrap_or_default(),
        })
    }

    /// Number of torrent rows.
    #[must_use]
    pub fn torrent_count(&self) -> usize {
        self.lock().rows.len()
    }

    /// Number of file rows across all torrents.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.lock().files.values().map(BTreeMap::len).sum()
    }

    fn begin(&self, call: StoreCall) -> DataResult<MutexGuard<'_, MemoryState>> {
        let operation = call.operation();
        let mut state = self.lock();
        state.calls.push(call);
        if state.disconnected || state.failures.remove(operation) {
            return Err(DataError::QueryFailed {
                operation,
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl TorrentStore for MemoryStore {
    async fn ping(&self) -> DataResult<()> {
        self.begin(StoreCall::Ping).map(drop)
    }

    async fn insert_pending(
        &self,
        batch: &[TorrentSnapshot],
    ) -> DataResult<HashMap<InfoHash, InsertedTorrent>> {
        let hashes = batch.iter().map(|item| item.info_hash.clone()).collect();
        let mut state = self.begin(StoreCall::InsertPending(hashes))?;
        let mut inserted = HashMap::with_capacity(batch.len());
        for item in batch {
            if let Some((id, _)) = state.rows.get(&item.info_hash) {
                inserted.insert(
                    item.info_hash.clone(),
                    InsertedTorrent {
                        id: *id,
                        created: false,
                    },
                );
                continue;
            }
            let id = state.allocate();
            state
                .rows
                .insert(item.info_hash.clone(), (id, item.attributes.clone()));
            let files = state.files.entry(id).or_default();
            for file in &item.files {
                files
                    .entry(file.index)
                    .or_insert_with(|| file.attributes.clone());
            }
            inserted.insert(item.info_hash.clone(), InsertedTorrent { id, created: true });
        }
        Ok(inserted)
    }

    async fn find_torrents(&self, hashes: &[InfoHash]) -> DataResult<Vec<PersistedTorrent>> {
        let state = self.begin(StoreCall::FindTorrents(hashes.to_vec()))?;
        if hashes.iter().any(|hash| state.poisoned.contains(hash)) {
            return Err(DataError::CorruptRow {
                operation: "find_torrents",
                column: "status",
                source: CoreError::UnknownStatusCode { code: 0 },
            });
        }
        Ok(hashes
            .iter()
            .filter_map(|hash| {
                state.rows.get(hash).map(|(id, attributes)| PersistedTorrent {
                    record: TorrentRecord {
                        id: *id,
                        info_hash: hash.clone(),
                        attributes: attributes.clone(),
                    },
                    files: state.files.get(id).cloned().unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn apply_torrent_changes(&self, id: TorrentId, change: &TorrentChange) -> DataResult<()> {
        let mut state = self.begin(StoreCall::ApplyTorrentChanges(id, change.clone()))?;
        state.check_poisoned(id, "apply_torrent_changes")?;
        if let Some(hash) = state.hash_of(id)
            && let Some((_, attributes)) = state.rows.get_mut(&hash)
        {
            attributes.apply(change);
        }
        Ok(())
    }

    async fn apply_file_changes(&self, id: TorrentId, changes: &FileChanges) -> DataResult<()> {
        let mut state = self.begin(StoreCall::ApplyFileChanges(id, changes.clone()))?;
        state.check_poisoned(id, "apply_file_changes")?;
        if state.hash_of(id).is_none() {
            return Ok(());
        }
        let files = state.files.entry(id).or_default();
        for (index, change) in changes {
            match files.get_mut(index) {
                Some(existing) => existing.apply(change),
                None => {
                    if let Some(attributes) = FileAttributes::from_change(change) {
                        files.insert(*index, attributes);
                    }
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, info_hash: &InfoHash) -> DataResult<bool> {
        let mut state = self.begin(StoreCall::Remove(info_hash.clone()))?;
        Ok(match state.rows.remove(info_hash) {
            Some((id, _)) => {
                state.files.remove(&id);
                true
            }
            None => false,
        })
    }

    async fn update_save_path(
        &self,
        id: TorrentId,
        new_path: &str,
        new_name: &str,
    ) -> DataResult<()> {
        let mut state = self.begin(StoreCall::UpdateSavePath(
            id,
            new_path.to_string(),
            new_name.to_string(),
        ))?;
        if let Some(hash) = state.hash_of(id)
            && let Some((_, attributes)) = state.rows.get_mut(&hash)
        {
            attributes.save_path = new_path.to_string();
            attributes.name = new_name.to_string();
        }
        Ok(())
    }

    async fn correct_statuses_on_shutdown(&self) -> DataResult<ShutdownCorrection> {
        let mut state = self.begin(StoreCall::CorrectStatuses)?;
        let mut correction = ShutdownCorrection::default();
        for (_, attributes) in state.rows.values_mut() {
            let change = attributes.shutdown_correction();
            if change.get(TorrentField::Status).is_some() {
                correction.statuses += 1;
            }
            let peers = [
                attributes.seeds,
                attributes.total_seeds,
                attributes.leechers,
                attributes.total_leechers,
            ];
            if peers.iter().any(|count| *count > 0) {
                correction.peers += 1;
            }
            attributes.apply(&change);
        }
        Ok(correction)
    }
}
