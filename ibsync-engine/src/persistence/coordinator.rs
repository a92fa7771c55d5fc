//! Persistence coordinator
//!
//! Owns the canonical in-memory copy of one dataset and mirrors it to both
//! tiers:
//!
//! - **Local:** every commit is written synchronously before the call returns
//! - **Remote:** a background worker flushes the latest committed state once
//!   the debounce window has passed without a newer commit
//!
//! **Debounce:** each schedule replaces the pending payload and resets the
//! timer, so a burst of commits produces a single remote write carrying the
//! final state. Remote failures are logged and reported through
//! [`SyncStatus`]; they are not retried. The next commit starts a new cycle.
//!
//! **Startup merge:** see [`PersistenceCoordinator::load_on_startup`].

use super::local::{self, LocalStore};
use super::remote::{RemoteSnapshot, RemoteStore};
use super::PersistenceRecord;
use chrono::{DateTime, Utc};
use ibsync_common::config::SyncSettings;
use ibsync_common::time::now;
use ibsync_common::{Error, Result, SyncStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which copy `load_on_startup` settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Remote,
    Local,
    Default,
}

/// Outcome of a startup load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: LoadSource,
    /// Local copy used although older than the freshness window
    pub stale: bool,
    /// Remote load error, if the remote tier failed
    pub remote_error: Option<String>,
}

/// Payload waiting for the debounce timer
struct Pending<T> {
    payload: T,
    /// `saved_at_local` of the envelope holding this payload
    saved_at_local: Option<DateTime<Utc>>,
    /// Schedule generation this payload was queued under
    generation: u64,
}

enum Command<T> {
    Schedule(Pending<T>),
    FlushNow(oneshot::Sender<()>),
}

/// Coordinates local and remote persistence of one dataset
pub struct PersistenceCoordinator<T> {
    key: String,
    state: T,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore<T>>,
    settings: SyncSettings,
    /// Serializes local writes with the worker's remote-timestamp update
    local_guard: Arc<Mutex<()>>,
    last_local_write: Option<DateTime<Utc>>,
    status: Arc<watch::Sender<SyncStatus>>,
    /// Bumped on every schedule; a flush only reports its outcome if still current
    generation: Arc<AtomicU64>,
    commands: mpsc::UnboundedSender<Command<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T> PersistenceCoordinator<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a coordinator and start its flush worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        key: impl Into<String>,
        initial: T,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore<T>>,
        settings: SyncSettings,
    ) -> Self {
        let key = key.into();
        let (status, _) = watch::channel(SyncStatus::Idle);
        let status = Arc::new(status);
        let local_guard = Arc::new(Mutex::new(()));
        let generation = Arc::new(AtomicU64::new(0));
        let (commands, rx) = mpsc::unbounded_channel();

        let worker = FlushWorker {
            key: key.clone(),
            local: Arc::clone(&local),
            remote: Arc::clone(&remote),
            status: Arc::clone(&status),
            generation: Arc::clone(&generation),
            local_guard: Arc::clone(&local_guard),
            debounce: settings.debounce(),
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            key,
            state: initial,
            local,
            remote,
            settings,
            local_guard,
            last_local_write: None,
            status,
            generation,
            commands,
            worker: Some(handle),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Canonical in-memory state
    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Replace the canonical state and store it in the local tier
    ///
    /// The in-memory state is updated even when the local write fails.
    pub fn write(&mut self, state: T) -> Result<()> {
        self.state = state;
        let record = PersistenceRecord::new(&self.state);
        {
            let _guard = self
                .local_guard
                .lock()
                .map_err(|_| Error::Internal("Local write guard poisoned".to_string()))?;
            local::store_record(self.local.as_ref(), &self.key, &record)?;
        }
        self.last_local_write = Some(record.saved_at_local);
        debug!(key = %self.key, "Local cache written");
        Ok(())
    }

    /// Arm (or re-arm) the debounced remote flush of the current state
    ///
    /// Never blocks.
    pub fn schedule_remote_flush(&self) {
        if self.commands.is_closed() {
            warn!(key = %self.key, "Flush worker stopped, remote flush dropped");
            return;
        }

        // Bumped under the status lock so a finishing flush cannot publish over it
        let mut generation = 0;
        self.status.send_modify(|status| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = SyncStatus::Pending;
        });

        let pending = Pending {
            payload: self.state.clone(),
            saved_at_local: self.last_local_write,
            generation,
        };
        if self.commands.send(Command::Schedule(pending)).is_err() {
            warn!(key = %self.key, "Flush worker stopped, remote flush dropped");
        }
    }

    /// Write locally and schedule the remote flush
    pub fn commit(&mut self, state: T) -> Result<()> {
        let written = self.write(state);
        self.schedule_remote_flush();
        if let Err(e) = &written {
            warn!(key = %self.key, error = %e, "Local cache write failed, state kept in memory");
        }
        written
    }

    /// Send any pending payload now and wait for the attempt to finish
    pub async fn flush_now(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::FlushNow(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Current sync status
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Watch sync status changes
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Flush pending work and stop the worker
    ///
    /// Later commits still write locally; their remote flushes are dropped.
    pub async fn shutdown(&mut self) {
        // Closing the channel makes the worker flush what is pending and exit
        let (closed, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.commands, closed));
        if let Some(handle) = self.worker.take() {
            let _ = handle.await;
        }
    }

    /// Load the dataset at startup, merging remote and local copies
    ///
    /// **Algorithm:**
    /// 1. Try the remote tier, then read the local envelope
    /// 2. Remote and local both present: the local copy wins when it is newer
    ///    than the remote save time, or, when the remote reports no save
    ///    time, when it is younger than the freshness window
    /// 3. Only one present: use it
    /// 4. Neither: use `default` (nothing is written)
    ///
    /// A local copy chosen over the remote tier is scheduled for a remote
    /// flush right away. When the remote tier failed and the local copy is
    /// older than the freshness window it is still used, flagged stale.
    pub async fn load_on_startup(&mut self, default: T) -> LoadReport {
        let remote = match self.remote.load().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Remote load failed, falling back to local cache");
                Err(e.to_string())
            }
        };

        let local: Option<PersistenceRecord<T>> =
            match local::load_record(self.local.as_ref(), &self.key) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %self.key, error = %e, "Local cache unreadable");
                    None
                }
            };

        let now = now();
        let freshness = self.settings.freshness();
        let fresh = move |saved: DateTime<Utc>| now - saved < freshness;

        let report = match (remote, local) {
            (Ok(Some(snapshot)), Some(record)) => {
                let local_wins = match snapshot.saved_at {
                    Some(remote_at) => record.saved_at_local > remote_at,
                    None => fresh(record.saved_at_local),
                };
                if local_wins {
                    self.adopt_local(record);
                    self.schedule_remote_flush();
                    self.report(LoadSource::Local, false, None)
                } else {
                    self.adopt_remote(snapshot);
                    self.report(LoadSource::Remote, false, None)
                }
            }
            (Ok(Some(snapshot)), None) => {
                self.adopt_remote(snapshot);
                self.report(LoadSource::Remote, false, None)
            }
            (Ok(None), Some(record)) => {
                self.adopt_local(record);
                self.schedule_remote_flush();
                self.report(LoadSource::Local, false, None)
            }
            (Err(reason), Some(record)) => {
                let stale = !fresh(record.saved_at_local);
                if stale {
                    warn!(
                        key = %self.key,
                        saved_at = %record.saved_at_local,
                        "Using stale local cache, remote unavailable"
                    );
                }
                self.adopt_local(record);
                self.status.send_replace(SyncStatus::NotSynced {
                    reason: reason.clone(),
                });
                self.report(LoadSource::Local, stale, Some(reason))
            }
            (remote, None) => {
                self.state = default;
                self.last_local_write = None;
                let reason = remote.err();
                if let Some(reason) = &reason {
                    self.status.send_replace(SyncStatus::NotSynced {
                        reason: reason.clone(),
                    });
                }
                self.report(LoadSource::Default, false, reason)
            }
        };

        info!(
            key = %self.key,
            source = ?report.source,
            stale = report.stale,
            "Dataset loaded"
        );
        report
    }

    fn adopt_local(&mut self, record: PersistenceRecord<T>) {
        self.last_local_write = Some(record.saved_at_local);
        self.state = record.payload;
    }

    fn adopt_remote(&mut self, snapshot: RemoteSnapshot<T>) {
        let saved_at = snapshot.saved_at.unwrap_or_else(now);
        self.state = snapshot.payload;

        // Mirror to local with the remote's time so the next start compares equal
        let record = PersistenceRecord {
            payload: &self.state,
            saved_at_local: saved_at,
            saved_at_remote: Some(saved_at),
        };
        let stored = self
            .local_guard
            .lock()
            .map_err(|_| Error::Internal("Local write guard poisoned".to_string()))
            .and_then(|_guard| local::store_record(self.local.as_ref(), &self.key, &record));
        match stored {
            Ok(()) => self.last_local_write = Some(saved_at),
            Err(e) => warn!(key = %self.key, error = %e, "Could not mirror remote copy locally"),
        }
        self.status.send_replace(SyncStatus::Synced { at: saved_at });
    }

    fn report(&self, source: LoadSource, stale: bool, remote_error: Option<String>) -> LoadReport {
        LoadReport {
            source,
            stale,
            remote_error,
        }
    }
}

/// Background task owning the debounce timer
struct FlushWorker<T> {
    key: String,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore<T>>,
    status: Arc<watch::Sender<SyncStatus>>,
    generation: Arc<AtomicU64>,
    local_guard: Arc<Mutex<()>>,
    debounce: Duration,
}

impl<T: Send + Sync + 'static> FlushWorker<T> {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command<T>>) {
        let mut pending: Option<Pending<T>> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let command = match deadline {
                Some(at) => {
                    tokio::select! {
                        command = rx.recv() => command,
                        _ = tokio::time::sleep_until(at) => {
                            deadline = None;
                            if let Some(p) = pending.take() {
                                self.flush(p).await;
                            }
                            continue;
                        }
                    }
                }
                None => rx.recv().await,
            };

            match command {
                Some(Command::Schedule(p)) => {
                    if pending.is_some() {
                        debug!(key = %self.key, "Coalescing remote flush");
                    }
                    pending = Some(p);
                    deadline = Some(Instant::now() + self.debounce);
                }
                Some(Command::FlushNow(done)) => {
                    deadline = None;
                    if let Some(p) = pending.take() {
                        self.flush(p).await;
                    }
                    let _ = done.send(());
                }
                None => {
                    if let Some(p) = pending.take() {
                        self.flush(p).await;
                    }
                    break;
                }
            }
        }
        debug!(key = %self.key, "Flush worker stopped");
    }

    async fn flush(&self, pending: Pending<T>) {
        self.publish(pending.generation, SyncStatus::Syncing);
        debug!(key = %self.key, "Remote flush started");

        let status = match self.remote.save(&pending.payload).await {
            Ok(outcome) if outcome.failed == 0 => {
                let at = now();
                if let Some(saved_at_local) = pending.saved_at_local {
                    self.mark_remote_saved(saved_at_local, at);
                }
                info!(key = %self.key, saved = outcome.successful, "Remote flush succeeded");
                SyncStatus::Synced { at }
            }
            Ok(outcome) => {
                warn!(
                    key = %self.key,
                    saved = outcome.successful,
                    failed = outcome.failed,
                    "Remote flush partially failed"
                );
                SyncStatus::PartiallySynced {
                    at: now(),
                    failed: outcome.failed,
                }
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Remote flush failed, local copy kept");
                SyncStatus::NotSynced {
                    reason: e.to_string(),
                }
            }
        };

        if !self.publish(pending.generation, status) {
            debug!(key = %self.key, "Newer commit queued, status left pending");
        }
    }

    /// Set `status` unless a newer schedule superseded `generation`
    fn publish(&self, generation: u64, status: SyncStatus) -> bool {
        self.status.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = status;
            true
        })
    }

    /// Stamp `savedAtRemote` on the local envelope if it still holds the flushed payload
    fn mark_remote_saved(&self, saved_at_local: DateTime<Utc>, at: DateTime<Utc>) {
        let result = (|| -> Result<()> {
            let _guard = self
                .local_guard
                .lock()
                .map_err(|_| Error::Internal("Local write guard poisoned".to_string()))?;
            let Some(raw) = self.local.get(&self.key)? else {
                return Ok(());
            };
            let mut envelope: serde_json::Value = serde_json::from_str(&raw)?;
            let current: Option<DateTime<Utc>> = envelope
                .get("savedAtLocal")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok());
            if current != Some(saved_at_local) {
                return Ok(());
            }
            if let Some(obj) = envelope.as_object_mut() {
                obj.insert("savedAtRemote".to_string(), serde_json::to_value(at)?);
            }
            self.local.set(&self.key, &serde_json::to_string(&envelope)?)
        })();

        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Could not stamp remote save time locally");
        }
    }
}
