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

//! Write-behind synchronizer between a transfer engine and the torrent projection.
//!
//! Layout: `pending.rs` (torrents awaiting their first insert), `monitor.rs`
//! (connection health transitions), `scheduler.rs` (commit interval and
//! backoff), `adapter.rs` (engine-facing handle), `command.rs` (worker queue
//! messages), `worker.rs` (single-writer event loop and commit cycle),
//! `synchronizer.rs` (start/stop lifecycle).

pub mod adapter;
pub mod error;
pub mod monitor;
pub mod pending;
pub mod scheduler;
pub mod synchronizer;

mod command;
mod worker;

pub use adapter::SyncHandle;
pub use error::{SyncError, SyncResult};
pub use monitor::ConnectionMonitor;
pub use pending::PendingCommitSet;
pub use scheduler::{CommitScheduler, SchedulerState};
pub use synchronizer::Synchronizer;
