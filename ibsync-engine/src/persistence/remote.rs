//! Remote tier
//!
//! The remote store is slow and may be unavailable at any time. Failures are
//! returned as [`Error::RemoteUnavailable`] and absorbed by the coordinator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ibsync_common::api::BatchOutcome;
use ibsync_common::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Remote copy of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot<T> {
    pub payload: T,
    /// Last successful remote save; None when the store does not report it
    pub saved_at: Option<DateTime<Utc>>,
}

/// Request/response remote store for one dataset
#[async_trait]
pub trait RemoteStore<T>: Send + Sync {
    /// Fetch the stored copy; Ok(None) when the store holds nothing
    async fn load(&self) -> Result<Option<RemoteSnapshot<T>>>;

    /// Replace the stored copy; partial failure is reported in the outcome
    async fn save(&self, payload: &T) -> Result<BatchOutcome>;
}

/// Remote tier for offline sessions: every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRemote;

#[async_trait]
impl<T: Send + Sync + 'static> RemoteStore<T> for OfflineRemote {
    async fn load(&self) -> Result<Option<RemoteSnapshot<T>>> {
        Err(Error::RemoteUnavailable("offline".to_string()))
    }

    async fn save(&self, _payload: &T) -> Result<BatchOutcome> {
        Err(Error::RemoteUnavailable("offline".to_string()))
    }
}

/// In-process remote store with failure injection and call recording
#[derive(Debug)]
pub struct InMemoryRemote<T> {
    snapshot: Mutex<Option<RemoteSnapshot<T>>>,
    saves: Mutex<Vec<T>>,
    loads: AtomicUsize,
    failing: AtomicBool,
    failed_records: AtomicUsize,
}

impl<T> Default for InMemoryRemote<T> {
    fn default() -> Self {
        Self {
            snapshot: Mutex::new(None),
            saves: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            failed_records: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> InMemoryRemote<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a stored copy
    pub fn with_snapshot(payload: T, saved_at: Option<DateTime<Utc>>) -> Self {
        let remote = Self::default();
        if let Ok(mut slot) = remote.snapshot.lock() {
            *slot = Some(RemoteSnapshot { payload, saved_at });
        }
        remote
    }

    /// Make every following call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Report this many failed records on each following save
    pub fn set_failed_records(&self, failed: usize) {
        self.failed_records.store(failed, Ordering::SeqCst);
    }

    /// Payloads of every save attempt, in call order
    pub fn saved(&self) -> Vec<T> {
        self.saves.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Currently stored copy
    pub fn stored(&self) -> Option<RemoteSnapshot<T>> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

fn poisoned() -> Error {
    Error::Internal("Remote store lock poisoned".to_string())
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> RemoteStore<T> for InMemoryRemote<T> {
    async fn load(&self) -> Result<Option<RemoteSnapshot<T>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("connection refused".to_string()));
        }
        Ok(self.snapshot.lock().map_err(|_| poisoned())?.clone())
    }

    async fn save(&self, payload: &T) -> Result<BatchOutcome> {
        self.saves.lock().map_err(|_| poisoned())?.push(payload.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("connection refused".to_string()));
        }
        *self.snapshot.lock().map_err(|_| poisoned())? = Some(RemoteSnapshot {
            payload: payload.clone(),
            saved_at: Some(ibsync_common::time::now()),
        });
        Ok(BatchOutcome {
            successful: 1,
            failed: self.failed_records.load(Ordering::SeqCst),
        })
    }
}
