//! Notices published to companion applications after the database changes.
//!
//! The bus wraps `tokio::broadcast`; slow subscribers lose the oldest notices and
//! publishing never fails when nobody is listening.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::model::InfoHash;

/// Identifier assigned to each published notice.
pub type NoticeId = u64;

const DEFAULT_CAPACITY: usize = 256;

/// Database-side changes worth telling consumers about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// New torrent rows became queryable.
    TorrentsInserted {
        /// Number of rows created.
        count: usize,
    },
    /// A torrent row was deleted.
    TorrentRemoved {
        /// Natural key of the removed torrent.
        info_hash: InfoHash,
    },
    /// Writes for one torrent started failing while the rest of the cycle went on.
    /// Published once until the torrent is written again.
    TorrentWriteFailed {
        /// Natural key of the affected torrent.
        info_hash: InfoHash,
        /// Writer operation that failed.
        operation: String,
    },
    /// The database stopped answering.
    DatabaseDisconnected,
    /// The database answers again.
    DatabaseConnected,
    /// Active statuses were corrected because the engine shut down.
    StatusesCorrected {
        /// Rows touched by the correction.
        rows: u64,
    },
}

/// Notice with its sequence id and emission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeEnvelope {
    /// Monotonic identifier.
    pub id: NoticeId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Wrapped notice.
    pub notice: Notice,
}

/// Broadcast bus for [`Notice`] values.
#[derive(Clone)]
pub struct NoticeBus {
    sender: Sender<NoticeEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl NoticeBus {
    /// Construct a bus with the provided broadcast capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "notice bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Publish a notice, returning its identifier.
    pub fn publish(&self, notice: Notice) -> NoticeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(NoticeEnvelope {
            id,
            timestamp: Utc::now(),
            notice,
        });
        id
    }

    /// Subscribe to notices published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<NoticeEnvelope> {
        self.sender.subscribe()
    }
}

impl std::fmt::Debug for NoticeBus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("NoticeBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new()
    }
}
