//! Best-effort durable mirror of the snapshot cache.
//!
//! The whole cache is written as one versioned JSON document after every
//! change and read back once at startup. Any read failure, corrupt payload or
//! version mismatch degrades to a cold cache; write failures are logged and
//! otherwise ignored.
//!
//! Writes are serialized: the table is copied and written under one lock, so
//! the last write to finish always carries the newest table.

use super::store::CacheStore;
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::WalletSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Key under which the cache document is stored.
pub const DEFAULT_STORAGE_KEY: &str = "wallet_data_cache";

/// Bumped whenever the persisted layout changes.
const FORMAT_VERSION: u32 = 1;

/// Generic byte-string key/value store.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> PersistenceResult<()>;
    fn remove(&self, key: &str) -> PersistenceResult<()>;
}

/// In-process store, mostly useful for tests and for running without disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> PersistenceResult<()> {
        self.values.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Distinguishes temporary files of concurrent writers in one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store that keeps one file per key inside a directory.
///
/// Writes go to a uniquely named temporary file first and are renamed into
/// place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> PersistenceResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> PersistenceResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = fs::write(&tmp, value).and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One cache entry as written to the durable store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub key: String,
    pub expires_at: DateTime<Utc>,
    pub snapshot: WalletSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    entries: Vec<PersistedEntry>,
}

/// Mirrors [`CacheStore`] contents into a [`DurableStore`].
///
/// Clones share the write lock.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn DurableStore>,
    key: String,
    write_lock: Arc<Mutex<()>>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_key(store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn DurableStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read persisted entries. Never fails: problems yield an empty list.
    pub fn load(&self) -> Vec<PersistedEntry> {
        match self.try_load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding persisted wallet cache");
                if let Err(e) = self.store.remove(&self.key) {
                    tracing::warn!(error = %e, "Failed to remove unusable wallet cache");
                }
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> PersistenceResult<Vec<PersistedEntry>> {
        let Some(bytes) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        let cache: PersistedCache = serde_json::from_slice(&bytes)?;
        if cache.version != FORMAT_VERSION {
            return Err(PersistenceError::Corrupt(format!(
                "unsupported format version {}",
                cache.version
            )));
        }
        Ok(cache.entries)
    }

    /// Seed `cache` with every persisted entry that has not yet expired.
    /// Returns the number restored.
    pub fn warm(&self, cache: &CacheStore) -> usize {
        self.load()
            .into_iter()
            .filter(|entry| cache.restore(&entry.key, Arc::new(entry.snapshot.clone()), entry.expires_at))
            .count()
    }

    /// Write the current contents of `cache`. Failures are logged only.
    ///
    /// Blocks on storage I/O; async callers should use
    /// [`PersistenceAdapter::save_in_background`].
    pub fn save(&self, cache: &CacheStore) {
        let _write = self.write_lock.lock();
        let entries = cache
            .entries()
            .into_iter()
            .map(|(key, entry)| PersistedEntry {
                key,
                expires_at: entry.expires_at,
                snapshot: (*entry.snapshot).clone(),
            })
            .collect();
        if let Err(e) = self.try_save(entries) {
            tracing::warn!(error = %e, "Failed to persist wallet cache");
        }
    }

    fn try_save(&self, entries: Vec<PersistedEntry>) -> PersistenceResult<()> {
        let document = PersistedCache {
            version: FORMAT_VERSION,
            entries,
        };
        let bytes = serde_json::to_vec(&document)?;
        self.store.set(&self.key, &bytes)
    }

    /// Run [`PersistenceAdapter::save`] on the blocking thread pool.
    ///
    /// The table is read when the write starts, not when this is called.
    /// Must be called from within a Tokio runtime.
    pub fn save_in_background(&self, cache: &Arc<CacheStore>) -> JoinHandle<()> {
        let adapter = self.clone();
        let cache = Arc::clone(cache);
        tokio::task::spawn_blocking(move || adapter.save(&cache))
    }

    /// Drop the persisted document. Failures are logged only.
    pub fn clear(&self) {
        let _write = self.write_lock.lock();
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(error = %e, "Failed to clear persisted wallet cache");
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("key", &self.key)
            .finish()
    }
}
