//! Torrent snapshots, persisted records, and the engine view contract.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::status::TorrentStatus;

/// Natural key assigned by the engine; lowercase hex, 40 (v1) or 64 (v2) chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InfoHash(String);

impl InfoHash {
    /// Parse and normalise an info hash.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInfoHash`] when the value is not hex of a valid length.
    pub fn parse(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        if trimmed.len() != 40 && trimmed.len() != 64 {
            return Err(CoreError::InvalidInfoHash {
                value: value.to_string(),
                reason: "length",
            });
        }
        if !trimmed.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidInfoHash {
                value: value.to_string(),
                reason: "not_hex",
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Borrow the normalised hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for InfoHash {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<InfoHash> for String {
    fn from(value: InfoHash) -> Self {
        value.0
    }
}

/// Surrogate key assigned by the database on first insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(pub i64);

impl Display for TorrentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Trackable scalar attributes of a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentAttributes {
    /// Engine lifecycle status.
    pub status: TorrentStatus,
    /// Display name.
    pub name: String,
    /// Directory the payload is stored in.
    pub save_path: String,
    /// Total wanted bytes.
    pub size: u64,
    /// Completion in permille (0-1000).
    pub progress: u16,
    /// Bytes still to download.
    pub remaining: u64,
    /// Connected seeds.
    pub seeds: u32,
    /// Seeds known to the swarm.
    pub total_seeds: u32,
    /// Connected leechers.
    pub leechers: u32,
    /// Leechers known to the swarm.
    pub total_leechers: u32,
}

/// Seed and leecher counters exposed by an engine view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCounts {
    /// Connected seeds.
    pub seeds: u32,
    /// Seeds known to the swarm.
    pub total_seeds: u32,
    /// Connected leechers.
    pub leechers: u32,
    /// Leechers known to the swarm.
    pub total_leechers: u32,
}

/// Trackable attributes of a single file within a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Path relative to the save path.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Engine download priority (0 skips the file).
    pub priority: u8,
    /// Completion in permille (0-1000).
    pub progress: u16,
}

/// Live state of a file as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Zero-based index within the torrent.
    pub index: u32,
    /// Current attribute values.
    #[serde(flatten)]
    pub attributes: FileAttributes,
}

/// Owned capture of a torrent's live state, detached from the engine handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentSnapshot {
    /// Natural key.
    pub info_hash: InfoHash,
    /// Current attribute values.
    #[serde(flatten)]
    pub attributes: TorrentAttributes,
    /// Current file list.
    #[serde(default)]
    pub files: Vec<FileSnapshot>,
}

impl TorrentSnapshot {
    /// Copy the state out of a borrowed engine view.
    #[must_use]
    pub fn capture<V: TorrentView + ?Sized>(view: &V) -> Self {
        let peers = view.peers();
        Self {
            info_hash: view.info_hash().clone(),
            attributes: TorrentAttributes {
                status: view.status(),
                name: view.name().to_string(),
                save_path: view.save_path().to_string(),
                size: view.size(),
                progress: view.progress(),
                remaining: view.remaining(),
                seeds: peers.seeds,
                total_seeds: peers.total_seeds,
                leechers: peers.leechers,
                total_leechers: peers.total_leechers,
            },
            files: view.files(),
        }
    }
}

/// Last-persisted torrent row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentRecord {
    /// Surrogate key.
    pub id: TorrentId,
    /// Natural key.
    pub info_hash: InfoHash,
    /// Attribute values as stored.
    pub attributes: TorrentAttributes,
}

/// A persisted torrent together with its persisted file rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTorrent {
    /// Torrent row.
    pub record: TorrentRecord,
    /// File rows keyed by file index.
    pub files: BTreeMap<u32, FileAttributes>,
}

/// Read-only view over an engine torrent handle.
///
/// Views are only valid for the duration of the engine callback that supplied
/// them; the synchronizer captures a [`TorrentSnapshot`] and never retains the view.
pub trait TorrentView {
    /// Natural key.
    fn info_hash(&self) -> &InfoHash;
    /// Lifecycle status.
    fn status(&self) -> TorrentStatus;
    /// Display name.
    fn name(&self) -> &str;
    /// Storage directory.
    fn save_path(&self) -> &str;
    /// Total wanted bytes.
    fn size(&self) -> u64;
    /// Completion in permille.
    fn progress(&self) -> u16;
    /// Bytes still to download.
    fn remaining(&self) -> u64;
    /// Seed and leecher counters.
    fn peers(&self) -> PeerCounts;
    /// File list.
    fn files(&self) -> Vec<FileSnapshot>;
}

impl TorrentView for TorrentSnapshot {
    fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    fn status(&self) -> TorrentStatus {
        self.attributes.status
    }

    fn name(&self) -> &str {
        &self.attributes.name
    }

    fn save_path(&self) -> &str {
        &self.attributes.save_path
    }

    fn size(&self) -> u64 {
        self.attributes.size
    }

    fn progress(&self) -> u16 {
        self.attributes.progress
    }

    fn remaining(&self) -> u64 {
        self.attributes.remaining
    }

    fn peers(&self) -> PeerCounts {
        PeerCounts {
            seeds: self.attributes.seeds,
            total_seeds: self.attributes.total_seeds,
            leechers: self.attributes.leechers,
            total_leechers: self.attributes.total_leechers,
        }
    }

    fn files(&self) -> Vec<FileSnapshot> {
        self.files.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_V1: &str = "C12FE1C06BBA254A9DC9F519B335AA7C1367A88A";

    fn sample() -> TorrentSnapshot {
        TorrentSnapshot {
            info_hash: InfoHash::parse(HASH_V1).expect("valid hash"),
            attributes: TorrentAttributes {
                status: TorrentStatus::Downloading,
                name: "ubuntu.iso".into(),
                save_path: "/downloads".into(),
                size: 4_000,
                progress: 250,
                remaining: 3_000,
                seeds: 5,
                total_seeds: 40,
                leechers: 3,
                total_leechers: 12,
            },
            files: vec![FileSnapshot {
                index: 0,
                attributes: FileAttributes {
                    path: "ubuntu.iso".into(),
                    size: 4_000,
                    priority: 4,
                    progress: 250,
                },
            }],
        }
    }

    #[test]
    fn info_hash_is_normalised() {
        let hash = InfoHash::parse(HASH_V1).expect("valid hash");
        assert_eq!(hash.as_str(), HASH_V1.to_ascii_lowercase());
        assert!(InfoHash::parse(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn info_hash_rejects_bad_input() {
        assert!(matches!(
            InfoHash::parse("abc"),
            Err(CoreError::InvalidInfoHash { reason: "length", .. })
        ));
        assert!(matches!(
            InfoHash::parse(&"z".repeat(40)),
            Err(CoreError::InvalidInfoHash {
                reason: "not_hex",
                ..
            })
        ));
    }

    #[test]
    fn capture_copies_view_state() {
        let snapshot = sample();
        let captured = TorrentSnapshot::capture(&snapshot);
        assert_eq!(captured, snapshot);
    }

    #[test]
    fn snapshot_json_is_flat() {
        let value = serde_json::to_value(sample()).expect("serialise snapshot");
        assert_eq!(value["status"], "downloading");
        assert_eq!(value["files"][0]["path"], "ubuntu.iso");
        assert_eq!(value["info_hash"], HASH_V1.to_ascii_lowercase());

        let restored: TorrentSnapshot = serde_json::from_value(value).expect("decode snapshot");
        assert_eq!(restored, sample());
    }
}
