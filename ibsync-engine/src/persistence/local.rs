//! Local cache tier
//!
//! A synchronous key-value store. Every dataset is stored as a JSON
//! [`PersistenceRecord`] envelope under its key, with a companion
//! `<key>_lastUpdated` ISO-8601 timestamp written alongside.
//!
//! A corrupt entry is discarded (both keys removed) and treated as absent.
//! A bare payload without envelope, as written by older clients, is accepted
//! when its companion timestamp is present.

use super::PersistenceRecord;
use chrono::{DateTime, Utc};
use ibsync_common::time::{parse_iso, to_iso};
use ibsync_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Synchronous key-value cache
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Key of the companion timestamp entry
pub fn last_updated_key(key: &str) -> String {
    format!("{}_lastUpdated", key)
}

// ========================================
// Stores
// ========================================

/// In-process store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("Local store lock poisoned".to_string()))
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key inside a data folder
///
/// Writes go to a temp file that is renamed over the target, so a crash
/// mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid local key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ========================================
// Envelope helpers
// ========================================

/// Store a record and its companion timestamp
pub fn store_record<T: Serialize>(
    store: &dyn LocalStore,
    key: &str,
    record: &PersistenceRecord<T>,
) -> Result<()> {
    let json = serde_json::to_string(record)?;
    store.set(key, &json)?;
    store.set(&last_updated_key(key), &to_iso(record.saved_at_local))?;
    Ok(())
}

/// Load a record, discarding it if it does not parse
pub fn load_record<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> Result<Option<PersistenceRecord<T>>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match decode_record(store, key, &raw) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            warn!(key = %key, error = %e, "Discarding corrupt local cache entry");
            discard(store, key)?;
            Ok(None)
        }
    }
}

/// Remove a dataset and its companion timestamp
pub fn discard(store: &dyn LocalStore, key: &str) -> Result<()> {
    store.remove(key)?;
    store.remove(&last_updated_key(key))
}

/// Companion timestamp of a dataset, if present and parseable
pub fn last_updated(store: &dyn LocalStore, key: &str) -> Result<Option<DateTime<Utc>>> {
    Ok(store
        .get(&last_updated_key(key))?
        .as_deref()
        .and_then(parse_iso))
}

fn decode_record<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
    raw: &str,
) -> Result<PersistenceRecord<T>> {
    let corrupt = |reason: String| Error::CorruptLocalState {
        key: key.to_string(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;

    let is_envelope = value.get("payload").is_some() && value.get("savedAtLocal").is_some();
    if is_envelope {
        return serde_json::from_value(value).map_err(|e| corrupt(e.to_string()));
    }

    // Bare payload: needs the companion timestamp to be usable
    let saved_at_local = last_updated(store, key)?
        .ok_or_else(|| corrupt("bare payload without timestamp".to_string()))?;
    let payload = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
    Ok(PersistenceRecord {
        payload,
        saved_at_local,
        saved_at_remote: None,
    })
}
