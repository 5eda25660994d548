//! Torrent status enumeration and its 1-based wire codec.
//!
//! # Design
//! - External consumers read the status column as an enum that starts at 1, so the
//!   mapping is an explicit table rather than the discriminant order.
//! - The same table seeds the `torrent_statuses` lookup in the migrations.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Lifecycle status reported by the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// Storage is being allocated.
    Allocating,
    /// Piece data is being verified.
    Checking,
    /// Resume data is being verified.
    CheckingResumeData,
    /// Actively downloading.
    Downloading,
    /// The engine reported an error.
    Error,
    /// Download completed.
    Finished,
    /// Downloading while ignoring queue limits.
    ForcedDownloading,
    /// Payload files are missing on disk.
    MissingFiles,
    /// Storage is being relocated.
    Moving,
    /// Paused by the user or on exit.
    Paused,
    /// Waiting for a queue slot.
    Queued,
    /// Active but without transfer.
    Stalled,
    /// Status could not be determined.
    Unknown,
}

static STATUS_TABLE: [(TorrentStatus, i16, &str); 13] = [
    (TorrentStatus::Allocating, 1, "Allocating"),
    (TorrentStatus::Checking, 2, "Checking"),
    (TorrentStatus::CheckingResumeData, 3, "CheckingResumeData"),
    (TorrentStatus::Downloading, 4, "Downloading"),
    (TorrentStatus::Error, 5, "Error"),
    (TorrentStatus::Finished, 6, "Finished"),
    (TorrentStatus::ForcedDownloading, 7, "ForcedDownloading"),
    (TorrentStatus::MissingFiles, 8, "MissingFiles"),
    (TorrentStatus::Moving, 9, "Moving"),
    (TorrentStatus::Paused, 10, "Paused"),
    (TorrentStatus::Queued, 11, "Queued"),
    (TorrentStatus::Stalled, 12, "Stalled"),
    (TorrentStatus::Unknown, 13, "Unknown"),
];

impl TorrentStatus {
    /// Every status in wire order.
    pub const ALL: [Self; 13] = [
        Self::Allocating,
        Self::Checking,
        Self::CheckingResumeData,
        Self::Downloading,
        Self::Error,
        Self::Finished,
        Self::ForcedDownloading,
        Self::MissingFiles,
        Self::Moving,
        Self::Paused,
        Self::Queued,
        Self::Stalled,
        Self::Unknown,
    ];

    /// Statuses implying the engine is still working on the torrent.
    pub const ACTIVE: [Self; 7] = [
        Self::Downloading,
        Self::ForcedDownloading,
        Self::Allocating,
        Self::Checking,
        Self::CheckingResumeData,
        Self::Moving,
        Self::Queued,
    ];

    /// Encode into the 1-based wire code.
    #[must_use]
    pub fn encode(self) -> i16 {
        STATUS_TABLE
            .iter()
            .find(|(status, _, _)| *status == self)
            .map_or(13, |(_, code, _)| *code)
    }

    /// Decode a 1-based wire code.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownStatusCode`] when the code is outside the table.
    pub fn decode(code: i16) -> CoreResult<Self> {
        STATUS_TABLE
            .iter()
            .find(|(_, candidate, _)| *candidate == code)
            .map(|(status, _, _)| *status)
            .ok_or(CoreError::UnknownStatusCode { code })
    }

    /// Name stored in the `torrent_statuses` lookup table.
    #[must_use]
    pub fn label(self) -> &'static str {
        STATUS_TABLE
            .iter()
            .find(|(status, _, _)| *status == self)
            .map_or("Unknown", |(_, _, label)| *label)
    }

    /// Full `(code, label)` table in wire order.
    pub fn table() -> impl Iterator<Item = (i16, &'static str)> {
        STATUS_TABLE.iter().map(|(_, code, label)| (*code, *label))
    }

    /// Whether the status implies an active transfer.
    #[must_use]
    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Value written for this status once the engine has gone away.
    #[must_use]
    pub fn on_shutdown(self) -> Self {
        if self.is_active() { Self::Paused } else { self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trips_every_status() {
        for status in TorrentStatus::ALL {
            assert_eq!(TorrentStatus::decode(status.encode()), Ok(status));
        }
    }

    #[test]
    fn codes_follow_wire_contract() {
        let codes: Vec<i16> = TorrentStatus::ALL.iter().map(|s| s.encode()).collect();
        assert_eq!(codes, (1..=13).collect::<Vec<i16>>());
        assert_eq!(TorrentStatus::Allocating.encode(), 1);
        assert_eq!(TorrentStatus::Downloading.encode(), 4);
        assert_eq!(TorrentStatus::Paused.encode(), 10);
        assert_eq!(TorrentStatus::Unknown.encode(), 13);
    }

    #[test]
    fn decode_rejects_out_of_range_codes() {
        assert_eq!(
            TorrentStatus::decode(0),
            Err(CoreError::UnknownStatusCode { code: 0 })
        );
        assert!(TorrentStatus::decode(14).is_err());
        assert!(TorrentStatus::decode(-1).is_err());
    }

    #[test]
    fn shutdown_pauses_only_active_statuses() {
        assert_eq!(
            TorrentStatus::Downloading.on_shutdown(),
            TorrentStatus::Paused
        );
        assert_eq!(TorrentStatus::Queued.on_shutdown(), TorrentStatus::Paused);
        assert_eq!(TorrentStatus::Finished.on_shutdown(), TorrentStatus::Finished);
        assert_eq!(TorrentStatus::Stalled.on_shutdown(), TorrentStatus::Stalled);
        assert_eq!(TorrentStatus::ACTIVE.len(), 7);
    }

    #[test]
    fn labels_match_variant_names() {
        for status in TorrentStatus::ALL {
            assert_eq!(status.label(), format!("{status:?}"));
        }
    }
}
