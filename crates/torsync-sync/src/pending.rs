//! Torrents observed by the engine that do not have a surrogate id yet.

use std::collections::HashMap;

use torsync_core::{InfoHash, TorrentSnapshot};

/// Pending torrents keyed by info hash.
///
/// Only the worker touches the set, so a drain is atomic with respect to
/// additions: anything added after [`PendingCommitSet::drain_for_commit`]
/// lands in the next batch.
#[derive(Debug, Default)]
pub struct PendingCommitSet {
    entries: HashMap<InfoHash, TorrentSnapshot>,
}

impl PendingCommitSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a torrent. Returns `false` and keeps the existing snapshot when
    /// the hash is already pending.
    pub fn add(&mut self, snapshot: TorrentSnapshot) -> bool {
        if self.entries.contains_key(&snapshot.info_hash) {
            return false;
        }
        self.entries.insert(snapshot.info_hash.clone(), snapshot);
        true
    }

    /// Replace the snapshot of an already pending torrent. Returns `false` when
    /// the hash is not pending.
    pub fn refresh(&mut self, snapshot: TorrentSnapshot) -> bool {
        match self.entries.get_mut(&snapshot.info_hash) {
            Some(existing) => {
                *existing = snapshot;
                true
            }
            None => false,
        }
    }

    /// Mutable access to a pending snapshot.
    pub fn get_mut(&mut self, info_hash: &InfoHash) -> Option<&mut TorrentSnapshot> {
        self.entries.get_mut(info_hash)
    }

    /// Forget a torrent so it never reaches the database.
    pub fn remove(&mut self, info_hash: &InfoHash) -> Option<TorrentSnapshot> {
        self.entries.remove(info_hash)
    }

    /// Whether `info_hash` is pending.
    #[must_use]
    pub fn contains(&self, info_hash: &InfoHash) -> bool {
        self.entries.contains_key(info_hash)
    }

    /// Number of pending torrents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every pending torrent, leaving the set empty.
    pub fn drain_for_commit(&mut self) -> Vec<TorrentSnapshot> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Return a drained batch after a failed insert. Snapshots added or
    /// refreshed since the drain win over the returned ones.
    pub fn restore(&mut self, batch: Vec<TorrentSnapshot>) {
        for snapshot in batch {
            self.entries
                .entry(snapshot.info_hash.clone())
                .or_insert(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torsync_test_support::fixtures::{hash, snapshot};

    #[test]
    fn add_is_idempotent_per_hash() {
        let mut pending = PendingCommitSet::new();
        assert!(pending.add(snapshot(1, 0)));
        let mut renamed = snapshot(1, 0);
        renamed.attributes.name = "other".into();
        assert!(!pending.add(renamed.clone()));
        assert_eq!(pending.len(), 1);

        assert!(pending.refresh(renamed));
        let drained = pending.drain_for_commit();
        assert_eq!(drained[0].attributes.name, "other");
        assert!(!pending.refresh(snapshot(2, 0)));
    }

    #[test]
    fn remove_before_drain_drops_the_torrent() {
        let mut pending = PendingCommitSet::new();
        pending.add(snapshot(1, 0));
        assert!(pending.remove(&hash(1)).is_some());
        assert!(pending.drain_for_commit().is_empty());
        assert!(pending.remove(&hash(1)).is_none());
    }

    #[test]
    fn drain_then_add_keeps_later_additions_separate() {
        let mut pending = PendingCommitSet::new();
        pending.add(snapshot(1, 0));
        let batch = pending.drain_for_commit();
        assert_eq!(batch.len(), 1);
        assert!(pending.is_empty());

        pending.add(snapshot(2, 0));
        let next = pending.drain_for_commit();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].info_hash, hash(2));
    }

    #[test]
    fn restore_keeps_newer_snapshots() {
        let mut pending = PendingCommitSet::new();
        pending.add(snapshot(1, 0));
        let batch = pending.drain_for_commit();

        let mut newer = snapshot(1, 0);
        newer.attributes.progress = 900;
        pending.add(newer);
        pending.restore(batch);

        assert_eq!(pending.len(), 1);
        let restored = pending.drain_for_commit();
        assert_eq!(restored[0].attributes.progress, 900);
    }
}
