//! Persistence coordinator behavior against in-memory tiers

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use ibsync_common::api::BatchOutcome;
use ibsync_common::config::SyncSettings;
use ibsync_common::time::now;
use ibsync_common::{Result, SyncStatus};
use ibsync_engine::persistence::local::{self, LocalStore};
use ibsync_engine::persistence::{
    InMemoryRemote, MemoryStore, OfflineRemote, PersistenceRecord, RemoteSnapshot, RemoteStore,
};
use ibsync_engine::{LoadSource, PersistenceCoordinator};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY: &str = "registry";

fn settings() -> SyncSettings {
    SyncSettings {
        debounce_ms: 2_000,
        freshness_hours: 24,
        ..SyncSettings::default()
    }
}

fn coordinator(
    local: Arc<MemoryStore>,
    remote: Arc<dyn RemoteStore<Vec<String>>>,
) -> PersistenceCoordinator<Vec<String>> {
    PersistenceCoordinator::new(KEY, Vec::new(), local, remote, settings())
}

fn seed_local(store: &MemoryStore, payload: &[&str], saved_at: chrono::DateTime<chrono::Utc>) {
    let record = PersistenceRecord {
        payload: payload.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        saved_at_local: saved_at,
        saved_at_remote: None,
    };
    local::store_record(store, KEY, &record).unwrap();
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_commits_produces_one_remote_write() {
    let remote = Arc::new(InMemoryRemote::new());
    let mut c = coordinator(Arc::new(MemoryStore::new()), remote.clone());

    c.commit(strings(&["first"])).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    c.commit(strings(&["second"])).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    c.commit(strings(&["third"])).unwrap();

    assert_eq!(remote.save_count(), 0);
    assert_eq!(c.status(), SyncStatus::Pending);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(remote.save_count(), 1);
    assert_eq!(remote.saved(), vec![strings(&["third"])]);
    assert!(c.status().is_connected());
}

#[tokio::test]
async fn test_newer_local_beats_older_remote() {
    let local = Arc::new(MemoryStore::new());
    seed_local(&local, &["local"], now() - ChronoDuration::minutes(5));
    let remote = Arc::new(InMemoryRemote::with_snapshot(
        strings(&["remote"]),
        Some(now() - ChronoDuration::hours(2)),
    ));
    let mut c = coordinator(local, remote.clone());

    let report = c.load_on_startup(Vec::new()).await;
    assert_eq!(report.source, LoadSource::Local);
    assert_eq!(c.state(), &strings(&["local"]));
    assert_eq!(remote.load_count(), 1);

    // The winning local copy goes back out to the remote tier
    c.flush_now().await;
    assert_eq!(remote.stored().unwrap().payload, strings(&["local"]));
}

#[tokio::test]
async fn test_newer_remote_beats_older_local() {
    let local = Arc::new(MemoryStore::new());
    seed_local(&local, &["local"], now() - ChronoDuration::hours(2));
    let remote = Arc::new(InMemoryRemote::with_snapshot(
        strings(&["remote"]),
        Some(now() - ChronoDuration::minutes(5)),
    ));
    let mut c = coordinator(local.clone(), remote);

    let report = c.load_on_startup(Vec::new()).await;
    assert_eq!(report.source, LoadSource::Remote);
    assert_eq!(c.state(), &strings(&["remote"]));

    let mirrored: PersistenceRecord<Vec<String>> =
        local::load_record(local.as_ref(), KEY).unwrap().unwrap();
    assert_eq!(mirrored.payload, strings(&["remote"]));
}

#[tokio::test]
async fn test_offline_start_uses_local_and_flags_stale() {
    let local = Arc::new(MemoryStore::new());
    seed_local(&local, &["old"], now() - ChronoDuration::hours(48));
    let mut c = coordinator(local, Arc::new(OfflineRemote));

    let report = c.load_on_startup(Vec::new()).await;
    assert_eq!(report.source, LoadSource::Local);
    assert!(report.stale);
    assert!(report.remote_error.is_some());
    assert_eq!(c.state(), &strings(&["old"]));
    assert!(matches!(c.status(), SyncStatus::NotSynced { .. }));
}

#[tokio::test]
async fn test_corrupt_local_cache_is_discarded() {
    let local = Arc::new(MemoryStore::new());
    local.set(KEY, "{not json").unwrap();
    let mut c = coordinator(local.clone(), Arc::new(InMemoryRemote::new()));

    let report = c.load_on_startup(strings(&["default"])).await;
    assert_eq!(report.source, LoadSource::Default);
    assert_eq!(c.state(), &strings(&["default"]));
    assert_eq!(local.get(KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_commit() {
    let remote = Arc::new(InMemoryRemote::new());
    let mut c = coordinator(Arc::new(MemoryStore::new()), remote.clone());

    c.commit(strings(&["last words"])).unwrap();
    c.shutdown().await;

    assert_eq!(remote.save_count(), 1);
    assert_eq!(remote.stored().unwrap().payload, strings(&["last words"]));
}

/// Remote whose saves take one second
#[derive(Default)]
struct SlowRemote {
    saves: Mutex<Vec<Vec<String>>>,
}

impl SlowRemote {
    fn saves(&self) -> Vec<Vec<String>> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore<Vec<String>> for SlowRemote {
    async fn load(&self) -> Result<Option<RemoteSnapshot<Vec<String>>>> {
        Ok(None)
    }

    async fn save(&self, payload: &Vec<String>) -> Result<BatchOutcome> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.saves.lock().unwrap().push(payload.clone());
        Ok(BatchOutcome {
            successful: 1,
            failed: 0,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_commit_during_flush_stays_pending() {
    let remote = Arc::new(SlowRemote::default());
    let mut c = coordinator(Arc::new(MemoryStore::new()), remote.clone());

    c.commit(strings(&["1"])).unwrap();
    // Debounce fires at 2s; the save is in flight until 3s
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    c.commit(strings(&["1", "2"])).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(remote.saves(), vec![strings(&["1"])]);
    assert_eq!(c.status(), SyncStatus::Pending);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(remote.saves(), vec![strings(&["1"]), strings(&["1", "2"])]);
    assert!(matches!(c.status(), SyncStatus::Synced { .. }));
}
