//! Snapshot builders for tests.

use torsync_core::{
    FileAttributes, FileSnapshot, InfoHash, TorrentAttributes, TorrentSnapshot, TorrentStatus,
};

/// Deterministic info hash derived from a single byte.
///
/// # Panics
///
/// Never in practice: the generated value is always 40 hex characters.
#[must_use]
pub fn hash(seed: u8) -> InfoHash {
    InfoHash::parse(&format!("{seed:02x}").repeat(20)).expect("generated hash is valid hex")
}

/// A downloading torrent with peers and `files` numbered files.
#[must_use]
pub fn snapshot(seed: u8, files: u32) -> TorrentSnapshot {
    TorrentSnapshot {
        info_hash: hash(seed),
        attributes: TorrentAttributes {
            status: TorrentStatus::Downloading,
            name: format!("torrent-{seed}"),
            save_path: "/downloads".into(),
            size: 2_000,
            progress: 100,
            remaining: 1_800,
            seeds: 5,
            total_seeds: 20,
            leechers: 3,
            total_leechers: 12,
        },
        files: (0..files).map(|index| file(index, &format!("file-{index}.mkv"))).collect(),
    }
}

/// A file snapshot with fixed size and zero progress.
#[must_use]
pub fn file(index: u32, path: &str) -> FileSnapshot {
    FileSnapshot {
        index,
        attributes: FileAttributes {
            path: path.to_string(),
            size: 1_000,
            priority: 4,
            progress: 0,
        },
    }
}
