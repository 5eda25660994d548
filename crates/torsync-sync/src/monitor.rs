//! Database health tracking with one notification per transition.

use torsync_core::{Notice, NoticeBus};
use torsync_data::TorrentStore;
use tracing::{info, warn};

/// Pings the writer and reports connect/disconnect transitions once each.
///
/// The monitor starts out assuming a healthy connection, so a first successful
/// check is silent.
#[derive(Debug)]
pub struct ConnectionMonitor {
    notices: NoticeBus,
    disconnected_notified: bool,
    connected_notified: bool,
}

impl ConnectionMonitor {
    /// Build a monitor publishing transitions on `notices`.
    #[must_use]
    pub const fn new(notices: NoticeBus) -> Self {
        Self {
            notices,
            disconnected_notified: false,
            connected_notified: true,
        }
    }

    /// Ping the store; returns whether it answered.
    pub async fn check(&mut self, store: &dyn TorrentStore) -> bool {
        match store.ping().await {
            Ok(()) => {
                if !self.connected_notified {
                    info!("database connected");
                    self.notices.publish(Notice::DatabaseConnected);
                    self.connected_notified = true;
                    self.disconnected_notified = false;
                }
                true
            }
            Err(err) => {
                if !self.disconnected_notified {
                    warn!(error = %err, operation = ?err.operation(), "database disconnected");
                    self.notices.publish(Notice::DatabaseDisconnected);
                    self.disconnected_notified = true;
                    self.connected_notified = false;
                }
                false
            }
        }
    }

    /// Whether the last check failed.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected_notified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;
    use torsync_test_support::MemoryStore;

    #[tokio::test]
    async fn one_notice_per_transition() {
        let bus = NoticeBus::new();
        let mut notices = bus.subscribe();
        let store = MemoryStore::new();
        let mut monitor = ConnectionMonitor::new(bus);

        assert!(monitor.check(&store).await);
        assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));

        store.set_connected(false);
        for _ in 0..3 {
            assert!(!monitor.check(&store).await);
        }
        assert!(monitor.is_disconnected());

        store.set_connected(true);
        assert!(monitor.check(&store).await);
        assert!(monitor.check(&store).await);

        let first = notices.try_recv().map(|envelope| envelope.notice);
        let second = notices.try_recv().map(|envelope| envelope.notice);
        assert_eq!(first.ok(), Some(Notice::DatabaseDisconnected));
        assert_eq!(second.ok(), Some(Notice::DatabaseConnected));
        assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));
        assert!(!monitor.is_disconnected());
    }
}
