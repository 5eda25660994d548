//! Newline-delimited JSON intake for engine events.
//!
//! Each line holds one [`EngineEvent`] tagged by `"type"`. Blank lines are
//! ignored; malformed lines are logged and skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use torsync_core::EngineEvent;
use torsync_sync::SyncHandle;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Counters reported when the reader reaches EOF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Events handed to the synchronizer.
    pub accepted: u64,
    /// Lines that failed to parse.
    pub skipped: u64,
}

/// Forward every event read from `reader` to `handle` until EOF.
///
/// # Errors
///
/// Returns an error when the reader fails or the synchronizer stopped
/// accepting events.
pub async fn pump_events<R>(reader: R, handle: &SyncHandle) -> AppResult<BridgeSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut summary = BridgeSummary::default();
    let mut line_number = 0_u64;

    while let Some(line) = lines.next().await {
        let line = line.map_err(|err| AppError::io("bridge.read_line", err))?;
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EngineEvent>(&line) {
            Ok(event) => {
                debug!(line = line_number, event = event.kind(), "engine event parsed");
                handle
                    .dispatch(event)
                    .map_err(|err| AppError::sync("bridge.dispatch", err))?;
                summary.accepted += 1;
            }
            Err(err) => {
                warn!(line = line_number, error = %err, "skipping malformed engine event");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}
