#![allow(clippy::redundant_pub_crate)]

use torsync_core::EngineEvent;

/// Messages consumed by the synchronizer worker, in arrival order.
#[derive(Debug)]
pub(crate) enum SyncCommand {
    /// Route an engine lifecycle event.
    Event(EngineEvent),
    /// Run the final commit and shutdown correction, then exit.
    Stop,
}
