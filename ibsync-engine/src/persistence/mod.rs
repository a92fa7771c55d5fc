//! Two-tier persistence
//!
//! - [`local`]: synchronous key-value cache (memory or one file per key)
//! - [`remote`]: asynchronous, sometimes unavailable store
//! - [`http`]: remote tier over the ibsync-server HTTP API
//! - [`coordinator`]: owns the canonical state, writes locally on every
//!   commit and flushes remotely on a debounced timer

pub mod coordinator;
pub mod http;
pub mod local;
pub mod remote;

pub use coordinator::{LoadReport, LoadSource, PersistenceCoordinator};
pub use http::HttpRemote;
pub use local::{FileStore, LocalStore, MemoryStore};
pub use remote::{InMemoryRemote, OfflineRemote, RemoteSnapshot, RemoteStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local key of the resident registry
pub const REGISTRY_KEY: &str = "registry";

/// Local key of the assignment grid
pub const GRID_KEY: &str = "grid";

/// Local key of the derived assignment map (local tier only)
pub const STAFF_ASSIGNMENTS_KEY: &str = "staffAssignments";

/// Envelope stored in the local tier
///
/// Local and remote saves are timestamped independently so that load-time
/// merging compares timestamps instead of trusting whichever copy loads first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceRecord<T> {
    pub payload: T,
    pub saved_at_local: DateTime<Utc>,
    #[serde(default)]
    pub saved_at_remote: Option<DateTime<Utc>>,
}

impl<T> PersistenceRecord<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            saved_at_local: ibsync_common::time::now(),
            saved_at_remote: None,
        }
    }
}
