//! Sync status reporting
//!
//! Persistence failures never block editing; they surface only through this
//! status, which the UI renders as a "synced / not synced" indicator.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Remote sync state of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing written yet in this session
    Idle,
    /// A debounced remote flush is armed
    Pending,
    /// A remote write is in flight
    Syncing,
    /// Last remote write succeeded
    Synced { at: DateTime<Utc> },
    /// Last remote write was accepted but some records failed
    PartiallySynced { at: DateTime<Utc>, failed: usize },
    /// Remote tier unreachable or rejected the write; local copy is current
    NotSynced { reason: String },
}

impl SyncStatus {
    /// False only when the last remote attempt failed outright
    pub fn is_connected(&self) -> bool {
        !matches!(self, SyncStatus::NotSynced { .. })
    }

    /// Short indicator label
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced { .. } => "synced",
            SyncStatus::PartiallySynced { .. } => "partially synced",
            SyncStatus::NotSynced { .. } => "not synced",
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_synced_is_disconnected() {
        let status = SyncStatus::NotSynced {
            reason: "connection refused".into(),
        };
        assert!(!status.is_connected());
        assert_eq!(status.label(), "not synced");
        assert!(SyncStatus::Pending.is_connected());
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(SyncStatus::Idle).unwrap();
        assert_eq!(json["state"], "idle");
    }
}
