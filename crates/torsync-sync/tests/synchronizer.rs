use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use torsync_config::SyncSettings;
use torsync_core::{Notice, TorrentStatus};
use torsync_data::TorrentStore;
use torsync_sync::{SyncError, Synchronizer};
use torsync_telemetry::Metrics;
use torsync_test_support::fixtures::{hash, snapshot};
use torsync_test_support::{MemoryStore, StoreCall};

fn synchronizer() -> Result<(Synchronizer, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let settings = SyncSettings {
        // Long enough that only `stop` commits inside a test.
        base_interval: Duration::from_secs(60),
        max_interval: Duration::from_secs(120),
        ..SyncSettings::default()
    };
    let sync = Synchronizer::new(
        Arc::clone(&store) as Arc<dyn TorrentStore>,
        settings,
        Metrics::new()?,
    );
    Ok((sync, store))
}

#[tokio::test]
async fn lifecycle_contract_violations_are_reported() -> Result<()> {
    let (mut sync, _store) = synchronizer()?;
    assert!(matches!(sync.handle(), Err(SyncError::NotStarted)));
    assert!(matches!(sync.stop().await, Err(SyncError::NotStarted)));

    let handle = sync.start()?;
    assert!(sync.is_running());
    assert!(matches!(sync.start(), Err(SyncError::AlreadyStarted)));

    sync.stop().await?;
    assert!(!sync.is_running());
    assert!(matches!(sync.stop().await, Err(SyncError::AlreadyStopped)));
    assert!(matches!(sync.start(), Err(SyncError::AlreadyStopped)));
    assert!(matches!(sync.handle(), Err(SyncError::AlreadyStopped)));
    assert!(matches!(
        handle.on_added(&snapshot(1, 0)),
        Err(SyncError::NotRunning {
            event: "torrent_added"
        })
    ));
    Ok(())
}

#[tokio::test]
async fn stop_runs_final_commit_and_correction() -> Result<()> {
    let (mut sync, store) = synchronizer()?;
    let mut notices = sync.subscribe();
    let handle = sync.start()?;

    handle.on_added(&snapshot(1, 2))?;
    handle.on_added(&snapshot(2, 0))?;
    handle.on_deleted(&hash(2))?;
    sync.stop().await?;

    assert_eq!(store.torrent_count(), 1);
    assert_eq!(store.file_count(), 2);
    let stored = store
        .torrent(&hash(1))
        .map(|torrent| torrent.record.attributes);
    let stored = stored.as_ref();
    assert_eq!(stored.map(|a| a.status), Some(TorrentStatus::Paused));
    assert_eq!(stored.map(|a| a.seeds + a.leechers), Some(0));

    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], StoreCall::InsertPending(vec![hash(1)]));
    assert_eq!(writes[1], StoreCall::CorrectStatuses);

    let received: Vec<Notice> = std::iter::from_fn(|| notices.try_recv().ok())
        .map(|envelope| envelope.notice)
        .collect();
    assert_eq!(
        received,
        vec![
            Notice::TorrentsInserted { count: 1 },
            Notice::StatusesCorrected { rows: 1 }
        ]
    );
    Ok(())
}

#[tokio::test]
async fn shutdown_event_corrects_once() -> Result<()> {
    let (mut sync, store) = synchronizer()?;
    let handle = sync.start()?;
    handle.on_added(&snapshot(1, 0))?;
    handle.on_shutdown()?;
    sync.stop().await?;

    let corrections = store
        .calls()
        .into_iter()
        .filter(|call| *call == StoreCall::CorrectStatuses)
        .count();
    assert_eq!(corrections, 1);
    Ok(())
}

#[tokio::test]
async fn stop_after_shutdown_event_still_commits_new_work() -> Result<()> {
    let (mut sync, store) = synchronizer()?;
    let handle = sync.start()?;
    handle.on_added(&snapshot(1, 0))?;
    handle.on_shutdown()?;
    handle.on_added(&snapshot(2, 1))?;
    sync.stop().await?;

    assert_eq!(store.torrent_count(), 2);
    assert_eq!(store.file_count(), 1);
    assert_eq!(
        store.writes(),
        vec![
            StoreCall::InsertPending(vec![hash(1)]),
            StoreCall::CorrectStatuses,
            StoreCall::InsertPending(vec![hash(2)]),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn scheduled_ticks_commit_without_stop() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let settings = SyncSettings {
        base_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(40),
        ..SyncSettings::default()
    };
    let mut sync = Synchronizer::new(
        Arc::clone(&store) as Arc<dyn TorrentStore>,
        settings,
        Metrics::new()?,
    );
    let handle = sync.start()?;
    handle.on_added(&snapshot(1, 0))?;

    let mut inserted = false;
    for _ in 0..200 {
        if store.torrent_count() == 1 {
            inserted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(inserted, "tick never inserted the pending torrent");

    let mut moved = snapshot(1, 0);
    moved.attributes.save_path = "/moved".into();
    handle.on_storage_moved(&moved, "/moved")?;
    sync.stop().await?;

    assert!(store.calls().iter().any(|call| matches!(
        call,
        StoreCall::UpdateSavePath(_, path, _) if path == "/moved"
    )));
    Ok(())
}
