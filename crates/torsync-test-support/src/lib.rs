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

//! Shared test helpers used across torsync suites.
//! Layout: fixtures.rs (snapshot builders), memory.rs (in-memory `TorrentStore`).

pub mod fixtures;
pub mod memory;

pub use memory::{MemoryStore, StoreCall};
