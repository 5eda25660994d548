#![allow(clippy::redundant_pub_crate)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use torsync_config::SyncSettings;
use torsync_core::{
    EngineEvent, FieldValue, FileAttributes, FileChange, FileChanges, FileFilter, InfoHash,
    Notice, NoticeBus, PersistedTorrent, TorrentChange, TorrentField, TorrentId, TorrentRecord,
    TorrentSnapshot, diff_files, diff_torrent,
};
use torsync_data::{DataError, TorrentStore};
use torsync_telemetry::{CycleOutcome, Metrics};
use tracing::{debug, info, warn};

use crate::command::SyncCommand;
use crate::monitor::ConnectionMonitor;
use crate::pending::PendingCommitSet;
use crate::scheduler::CommitScheduler;

pub(crate) fn spawn(worker: Worker, commands: UnboundedReceiver<SyncCommand>) -> JoinHandle<()> {
    tokio::spawn(worker.run(commands))
}

/// Last-persisted state of a torrent with a surrogate id.
struct Tracked {
    record: TorrentRecord,
    files: BTreeMap<u32, FileAttributes>,
}

impl Tracked {
    fn inserted(id: TorrentId, snapshot: TorrentSnapshot) -> Self {
        Self {
            record: TorrentRecord {
                id,
                info_hash: snapshot.info_hash,
                attributes: snapshot.attributes,
            },
            files: snapshot
                .files
                .into_iter()
                .map(|file| (file.index, file.attributes))
                .collect(),
        }
    }
}

impl From<PersistedTorrent> for Tracked {
    fn from(persisted: PersistedTorrent) -> Self {
        Self {
            record: persisted.record,
            files: persisted.files,
        }
    }
}

/// Changes waiting for the next commit cycle.
#[derive(Default)]
struct Staged {
    torrent: TorrentChange,
    files: FileChanges,
}

enum CycleFailure {
    Disconnected,
    Store(DataError),
}

impl From<DataError> for CycleFailure {
    fn from(err: DataError) -> Self {
        Self::Store(err)
    }
}

pub(crate) struct Worker {
    store: Arc<dyn TorrentStore>,
    notices: NoticeBus,
    metrics: Metrics,
    filter: FileFilter,
    log_changes: bool,
    monitor: ConnectionMonitor,
    scheduler: CommitScheduler,
    pending: PendingCommitSet,
    tracked: HashMap<InfoHash, Tracked>,
    staged: HashMap<InfoHash, Staged>,
    // Updated torrents whose surrogate id this process has not seen yet.
    parked: HashMap<InfoHash, TorrentSnapshot>,
    deletes: BTreeSet<InfoHash>,
    // Torrents whose own writes or lookups fail while the rest of the cycle succeeds.
    stuck: HashSet<InfoHash>,
    corrected: bool,
}

impl Worker {
    pub(crate) fn new(
        store: Arc<dyn TorrentStore>,
        settings: &SyncSettings,
        notices: NoticeBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            monitor: ConnectionMonitor::new(notices.clone()),
            notices,
            metrics,
            filter: FileFilter::new(&settings.previewable_extensions),
            log_changes: settings.log_changes,
            scheduler: CommitScheduler::new(settings.base_interval, settings.max_interval),
            pending: PendingCommitSet::new(),
            tracked: HashMap::new(),
            staged: HashMap::new(),
            parked: HashMap::new(),
            deletes: BTreeSet::new(),
            stuck: HashSet::new(),
            corrected: false,
        }
    }

    async fn run(mut self, mut commands: UnboundedReceiver<SyncCommand>) {
        let first = self.scheduler.start();
        self.metrics.observe_commit_interval(first);
        let timer = sleep(first);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(SyncCommand::Event(event)) => self.handle(event).await,
                        Some(SyncCommand::Stop) | None => break,
                    }
                }
                () = &mut timer => {
                    let next = self.tick().await;
                    timer.as_mut().reset(Instant::now() + next);
                }
            }
        }

        self.shutdown().await;
        info!("synchronizer worker stopped");
    }

    async fn handle(&mut self, event: EngineEvent) {
        debug!(event = event.kind(), "engine event received");
        match event {
            EngineEvent::TorrentAdded { torrent } => {
                let torrent = self.filter_files(torrent);
                self.on_added(torrent);
            }
            EngineEvent::TorrentDeleted { info_hash } => self.on_deleted(info_hash),
            EngineEvent::TorrentsUpdated { torrents } => {
                for torrent in torrents {
                    let torrent = self.filter_files(torrent);
                    self.on_updated(torrent);
                }
            }
            EngineEvent::StorageMoved { torrent, new_path } => {
                let torrent = self.filter_files(torrent);
                self.on_storage_moved(torrent, new_path).await;
            }
            EngineEvent::EngineShutdown => self.shutdown().await,
        }
        self.publish_gauges();
    }

    fn filter_files(&self, mut torrent: TorrentSnapshot) -> TorrentSnapshot {
        torrent.files = self.filter.apply(std::mem::take(&mut torrent.files));
        torrent
    }

    fn on_added(&mut self, torrent: TorrentSnapshot) {
        let info_hash = torrent.info_hash.clone();
        if self.tracked.contains_key(&info_hash) || self.pending.contains(&info_hash) {
            debug!(info_hash = %info_hash, "torrent already known");
            return;
        }
        self.parked.remove(&info_hash);
        self.pending.add(torrent);
        debug!(info_hash = %info_hash, "torrent queued for insert");
    }

    fn on_deleted(&mut self, info_hash: InfoHash) {
        if self.pending.remove(&info_hash).is_some() {
            debug!(info_hash = %info_hash, "pending torrent dropped before insert");
            return;
        }
        self.parked.remove(&info_hash);
        self.tracked.remove(&info_hash);
        self.staged.remove(&info_hash);
        self.stuck.remove(&info_hash);
        debug!(info_hash = %info_hash, "torrent delete scheduled");
        self.deletes.insert(info_hash);
    }

    fn on_updated(&mut self, torrent: TorrentSnapshot) {
        let info_hash = torrent.info_hash.clone();
        if self.pending.contains(&info_hash) {
            self.pending.refresh(torrent);
        } else if self.tracked.contains_key(&info_hash) {
            self.stage_update(&torrent);
        } else if self.deletes.contains(&info_hash) {
            debug!(info_hash = %info_hash, "update for deleted torrent ignored");
        } else {
            self.parked.insert(info_hash, torrent);
        }
    }

    async fn on_storage_moved(&mut self, mut torrent: TorrentSnapshot, new_path: String) {
        let info_hash = torrent.info_hash.clone();
        let name = torrent.attributes.name.clone();

        if let Some(snapshot) = self
            .pending
            .get_mut(&info_hash)
            .or_else(|| self.parked.get_mut(&info_hash))
        {
            snapshot.attributes.save_path = new_path;
            snapshot.attributes.name = name;
            return;
        }

        let Some(id) = self.tracked.get(&info_hash).map(|tracked| tracked.record.id) else {
            if !self.deletes.contains(&info_hash) {
                torrent.attributes.save_path = new_path;
                self.parked.insert(info_hash, torrent);
            }
            return;
        };

        if self.monitor.check(self.store.as_ref()).await {
            self.metrics.inc_store_operation("update_save_path");
            match self.store.update_save_path(id, &new_path, &name).await {
                Ok(()) => {
                    self.moved(&info_hash, new_path, name);
                    return;
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        info_hash = %info_hash,
                        "storage move deferred to the next commit"
                    );
                }
            }
        }
        self.stage_move(&info_hash, new_path, name);
    }

    fn moved(&mut self, info_hash: &InfoHash, new_path: String, name: String) {
        if let Some(staged) = self.staged.get_mut(info_hash) {
            if staged.torrent.get(TorrentField::SavePath).is_some() {
                staged
                    .torrent
                    .set(TorrentField::SavePath, FieldValue::Text(new_path.clone()));
            }
            if staged.torrent.get(TorrentField::Name).is_some() {
                staged
                    .torrent
                    .set(TorrentField::Name, FieldValue::Text(name.clone()));
            }
        }
        if let Some(tracked) = self.tracked.get_mut(info_hash) {
            info!(
                info_hash = %info_hash,
                id = %tracked.record.id,
                save_path = %new_path,
                "storage move persisted"
            );
            tracked.record.attributes.save_path = new_path;
            tracked.record.attributes.name = name;
        }
    }

    fn stage_move(&mut self, info_hash: &InfoHash, new_path: String, name: String) {
        let Some(tracked) = self.tracked.get(info_hash) else {
            return;
        };
        let mut moved = tracked.record.attributes.clone();
        moved.save_path = new_path;
        moved.name = name;
        let change = diff_torrent(&moved, &tracked.record.attributes);
        if change.is_empty() {
            return;
        }
        self.staged
            .entry(info_hash.clone())
            .or_default()
            .torrent
            .merge(change);
    }

    fn stage_update(&mut self, live: &TorrentSnapshot) {
        let Some(tracked) = self.tracked.get(&live.info_hash) else {
            return;
        };
        let torrent = diff_torrent(&live.attributes, &tracked.record.attributes);
        let files = diff_files(&live.files, &tracked.files);
        if torrent.is_empty() && files.is_empty() {
            self.staged.remove(&live.info_hash);
            return;
        }
        if self.log_changes {
            for (field, value) in torrent.iter() {
                debug!(
                    info_hash = %live.info_hash,
                    field = field.column(),
                    value = ?value,
                    "torrent field changed"
                );
            }
            for (index, change) in &files {
                debug!(
                    info_hash = %live.info_hash,
                    file_index = index,
                    fields = change.len(),
                    "file changed"
                );
            }
        }
        self.staged
            .insert(live.info_hash.clone(), Staged { torrent, files });
    }

    async fn tick(&mut self) -> Duration {
        self.scheduler.begin_cycle();
        let next = match self.commit_cycle().await {
            Ok(()) => {
                self.metrics.inc_commit_cycle(CycleOutcome::Succeeded);
                self.scheduler.on_success()
            }
            Err(CycleFailure::Disconnected) => {
                self.metrics.inc_commit_cycle(CycleOutcome::Deferred);
                let next = self.scheduler.on_failure();
                debug!(retry_in_ms = millis(next), "commit deferred; database unreachable");
                next
            }
            Err(CycleFailure::Store(err)) => {
                self.metrics.inc_commit_cycle(CycleOutcome::Failed);
                let next = self.scheduler.on_failure();
                warn!(
                    error = %err,
                    operation = ?err.operation(),
                    retry_in_ms = millis(next),
                    "commit cycle failed"
                );
                next
            }
        };
        self.metrics.observe_commit_interval(next);
        self.publish_gauges();
        next
    }

    async fn commit_cycle(&mut self) -> Result<(), CycleFailure> {
        if !self.monitor.check(self.store.as_ref()).await {
            return Err(CycleFailure::Disconnected);
        }
        self.flush_deletes().await?;
        self.insert_pending().await?;
        self.resolve_parked().await?;
        self.apply_staged().await?;
        Ok(())
    }

    async fn flush_deletes(&mut self) -> Result<(), CycleFailure> {
        while let Some(info_hash) = self.deletes.first().cloned() {
            self.metrics.inc_store_operation("remove");
            let existed = self.store.remove(&info_hash).await?;
            self.deletes.remove(&info_hash);
            debug!(info_hash = %info_hash, existed, "torrent row removed");
            if existed {
                self.notices.publish(Notice::TorrentRemoved { info_hash });
            }
        }
        Ok(())
    }

    async fn insert_pending(&mut self) -> Result<(), CycleFailure> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = self.pending.drain_for_commit();
        self.metrics.inc_store_operation("insert_pending");
        let inserted = match self.store.insert_pending(&batch).await {
            Ok(inserted) => inserted,
            Err(err) => {
                self.pending.restore(batch);
                return Err(err.into());
            }
        };

        let mut created = 0_usize;
        let mut unresolved = Vec::new();
        for snapshot in batch {
            match inserted.get(&snapshot.info_hash) {
                Some(result) if result.created => {
                    created += 1;
                    if self.log_changes {
                        debug!(
                            info_hash = %snapshot.info_hash,
                            id = %result.id,
                            files = snapshot.files.len(),
                            "torrent inserted"
                        );
                    }
                    self.tracked.insert(
                        snapshot.info_hash.clone(),
                        Tracked::inserted(result.id, snapshot),
                    );
                }
                Some(_) => {
                    debug!(info_hash = %snapshot.info_hash, "torrent row already present");
                    self.parked.insert(snapshot.info_hash.clone(), snapshot);
                }
                None => unresolved.push(snapshot),
            }
        }

        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), "insert returned no id; retrying next cycle");
            self.pending.restore(unresolved);
        }
        if created > 0 {
            info!(count = created, "pending torrents inserted");
            self.notices.publish(Notice::TorrentsInserted { count: created });
        }
        Ok(())
    }

    async fn resolve_parked(&mut self) -> Result<(), CycleFailure> {
        if self.parked.is_empty() {
            return Ok(());
        }
        let hashes: Vec<InfoHash> = self.parked.keys().cloned().collect();
        self.metrics.inc_store_operation("find_torrents");
        let (found, unreadable) = match self.store.find_torrents(&hashes).await {
            Ok(found) => (found, HashSet::new()),
            Err(DataError::CorruptRow { .. }) => self.find_each(&hashes).await?,
            Err(err) => return Err(err.into()),
        };

        for persisted in found {
            let Some(live) = self.parked.remove(&persisted.record.info_hash) else {
                continue;
            };
            self.stuck.remove(&live.info_hash);
            self.tracked
                .insert(live.info_hash.clone(), Tracked::from(persisted));
            self.stage_update(&live);
        }
        let missing: Vec<InfoHash> = self
            .parked
            .keys()
            .filter(|info_hash| !unreadable.contains(*info_hash))
            .cloned()
            .collect();
        for info_hash in missing {
            if let Some(snapshot) = self.parked.remove(&info_hash) {
                debug!(info_hash = %info_hash, "unknown torrent queued for insert");
                self.stuck.remove(&info_hash);
                self.pending.add(snapshot);
            }
        }
        Ok(())
    }

    /// Look hashes up one at a time after a batch lookup hit an unreadable row.
    async fn find_each(
        &mut self,
        hashes: &[InfoHash],
    ) -> Result<(Vec<PersistedTorrent>, HashSet<InfoHash>), CycleFailure> {
        let mut found = Vec::new();
        let mut unreadable = HashSet::new();
        for info_hash in hashes {
            self.metrics.inc_store_operation("find_torrents");
            match self.store.find_torrents(std::slice::from_ref(info_hash)).await {
                Ok(rows) => found.extend(rows),
                Err(err @ DataError::CorruptRow { .. }) => {
                    self.report_stuck(info_hash, &err);
                    unreadable.insert(info_hash.clone());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok((found, unreadable))
    }

    fn report_stuck(&mut self, info_hash: &InfoHash, err: &DataError) {
        let operation = err.operation().unwrap_or("unknown");
        if self.stuck.insert(info_hash.clone()) {
            warn!(
                error = %err,
                info_hash = %info_hash,
                operation,
                "torrent could not be synced; retrying next cycle"
            );
            self.notices.publish(Notice::TorrentWriteFailed {
                info_hash: info_hash.clone(),
                operation: operation.to_string(),
            });
        } else {
            debug!(info_hash = %info_hash, operation, "torrent still failing to sync");
        }
    }

    async fn apply_staged(&mut self) -> Result<(), CycleFailure> {
        let hashes: Vec<InfoHash> = self.staged.keys().cloned().collect();
        let mut first_failure = None;
        for info_hash in hashes {
            let Some(staged) = self.staged.remove(&info_hash) else {
                continue;
            };
            match self.apply_one(&info_hash, staged).await {
                Ok(()) => {
                    self.stuck.remove(&info_hash);
                }
                Err(err) => {
                    // A lost connection fails every remaining torrent the same way.
                    if !self.monitor.check(self.store.as_ref()).await {
                        return Err(err.into());
                    }
                    self.report_stuck(&info_hash, &err);
                    first_failure.get_or_insert(err);
                }
            }
        }
        first_failure.map_or(Ok(()), |err| Err(err.into()))
    }

    async fn apply_one(
        &mut self,
        info_hash: &InfoHash,
        mut staged: Staged,
    ) -> Result<(), DataError> {
        let Some(tracked) = self.tracked.get_mut(info_hash) else {
            return Ok(());
        };
        let id = tracked.record.id;

        if !staged.torrent.is_empty() {
            self.metrics.inc_store_operation("apply_torrent_changes");
            if let Err(err) = self.store.apply_torrent_changes(id, &staged.torrent).await {
                self.staged.insert(info_hash.clone(), staged);
                return Err(err);
            }
            tracked.record.attributes.apply(&staged.torrent);
            staged.torrent = TorrentChange::default();
        }

        if !staged.files.values().all(FileChange::is_empty) {
            self.metrics.inc_store_operation("apply_file_changes");
            if let Err(err) = self.store.apply_file_changes(id, &staged.files).await {
                self.staged.insert(info_hash.clone(), staged);
                return Err(err);
            }
            for (index, change) in &staged.files {
                match tracked.files.get_mut(index) {
                    Some(file) => file.apply(change),
                    None => {
                        if let Some(file) = FileAttributes::from_change(change) {
                            tracked.files.insert(*index, file);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        match self.commit_cycle().await {
            Ok(()) => self.metrics.inc_commit_cycle(CycleOutcome::Succeeded),
            Err(CycleFailure::Disconnected) => {
                self.metrics.inc_commit_cycle(CycleOutcome::Deferred);
                warn!("final commit skipped; database unreachable");
            }
            Err(CycleFailure::Store(err)) => {
                self.metrics.inc_commit_cycle(CycleOutcome::Failed);
                warn!(error = %err, operation = ?err.operation(), "final commit failed");
            }
        }

        if self.corrected {
            self.publish_gauges();
            return;
        }
        self.metrics
            .inc_store_operation("correct_statuses_on_shutdown");
        match self.store.correct_statuses_on_shutdown().await {
            Ok(correction) => {
                for tracked in self.tracked.values_mut() {
                    let change = tracked.record.attributes.shutdown_correction();
                    tracked.record.attributes.apply(&change);
                }
                self.staged.clear();
                self.corrected = true;
                info!(
                    statuses = correction.statuses,
                    peers = correction.peers,
                    "shutdown correction applied"
                );
                self.notices.publish(Notice::StatusesCorrected {
                    rows: correction.statuses,
                });
            }
            Err(err) => {
                warn!(error = %err, operation = ?err.operation(), "shutdown correction failed");
            }
        }
        self.publish_gauges();
    }

    fn publish_gauges(&self) {
        self.metrics.set_pending_torrents(self.pending.len());
        self.metrics.set_tracked_torrents(self.tracked.len());
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
