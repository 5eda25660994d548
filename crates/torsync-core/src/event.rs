//! Lifecycle events emitted by the transfer engine.

use serde::{Deserialize, Serialize};

use crate::model::{InfoHash, TorrentSnapshot};

/// Typed engine lifecycle notification, already detached from engine handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A torrent was added to the engine.
    TorrentAdded {
        /// Captured torrent state.
        torrent: TorrentSnapshot,
    },
    /// A torrent was removed from the engine.
    TorrentDeleted {
        /// Natural key of the removed torrent.
        info_hash: InfoHash,
    },
    /// One or more torrents reported new state.
    TorrentsUpdated {
        /// Captured torrent states.
        torrents: Vec<TorrentSnapshot>,
    },
    /// Torrent storage finished moving to a new directory.
    StorageMoved {
        /// Captured torrent state.
        torrent: TorrentSnapshot,
        /// Destination directory.
        new_path: String,
    },
    /// The engine is about to shut down.
    EngineShutdown,
}

impl EngineEvent {
    /// Machine-friendly discriminator for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TorrentAdded { .. } => "torrent_added",
            Self::TorrentDeleted { .. } => "torrent_deleted",
            Self::TorrentsUpdated { .. } => "torrents_updated",
            Self::StorageMoved { .. } => "storage_moved",
            Self::EngineShutdown => "engine_shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_decode_from_tagged_json() {
        let deleted: EngineEvent = serde_json::from_str(
            r#"{"type":"torrent_deleted","info_hash":"c12fe1c06bba254a9dc9f519b335aa7c1367a88a"}"#,
        )
        .expect("decode deleted event");
        assert_eq!(deleted.kind(), "torrent_deleted");

        let shutdown: EngineEvent =
            serde_json::from_str(r#"{"type":"engine_shutdown"}"#).expect("decode shutdown");
        assert_eq!(shutdown, EngineEvent::EngineShutdown);
    }

    #[test]
    fn invalid_hash_is_rejected_while_decoding() {
        let result = serde_json::from_str::<EngineEvent>(
            r#"{"type":"torrent_deleted","info_hash":"nope"}"#,
        );
        assert!(result.is_err());
    }
}
