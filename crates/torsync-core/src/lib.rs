#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Engine-agnostic torrent model shared by the torsync crates.
//!
//! Layout: `model.rs` (snapshots, records, engine views), `status.rs` (status
//! codec), `change.rs` (change tracking), `event.rs` (engine lifecycle events),
//! `notice.rs` (notices for companion applications), `filter.rs` (file filter).

pub mod change;
pub mod error;
pub mod event;
pub mod filter;
pub mod model;
pub mod notice;
pub mod status;

pub use change::{
    FieldValue, FileChange, FileChanges, FileField, PendingChange, TorrentChange, TorrentField,
    diff_files, diff_torrent,
};
pub use error::{CoreError, CoreResult};
pub use event::EngineEvent;
pub use filter::FileFilter;
pub use model::{
    FileAttributes, FileSnapshot, InfoHash, PeerCounts, PersistedTorrent, TorrentAttributes,
    TorrentId, TorrentRecord, TorrentSnapshot, TorrentView,
};
pub use notice::{Notice, NoticeBus, NoticeEnvelope, NoticeId};
pub use status::TorrentStatus;
