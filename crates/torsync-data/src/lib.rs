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

//! Writer side of torsync: the `TorrentStore` contract and its Postgres implementation.
//!
//! Layout: `store.rs` (writer contract), `postgres.rs` (sqlx implementation),
//! `error.rs` (data errors), `migrations/` (schema).

pub mod error;
pub mod postgres;
pub mod store;

pub use error::{DataError, Result as DataResult};
pub use postgres::PgTorrentStore;
pub use store::{InsertedTorrent, ShutdownCorrection, TorrentStore};
