//! TTL-bounded, capacity-bounded table of wallet snapshots.
//!
//! Expired entries are dropped lazily on read and actively by
//! [`CacheStore::sweep_expired`]. When an insert would exceed `max_entries`,
//! the oldest-inserted entries are evicted first (FIFO by insertion, not by
//! access).

use crate::clock::{to_time_delta, Clock};
use crate::models::WalletSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// A cached snapshot with its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: Arc<WalletSnapshot>,
    pub expires_at: DateTime<Utc>,
    inserted_seq: u64,
}

impl CacheEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Write sequence of this entry. Strictly increasing across every write
    /// to the store, so a larger version is always the newer snapshot.
    pub fn version(&self) -> u64 {
        self.inserted_seq
    }
}

/// Outcome of a [`CacheStore::set_versioned`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stored {
    /// Entries evicted to make room
    pub evicted: usize,
    /// Version assigned to the new entry
    pub version: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, CacheEntry>,
    /// Insertion sequence -> key, oldest first
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Table {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.inserted_seq);
        Some(entry)
    }

    fn insert(&mut self, key: String, snapshot: Arc<WalletSnapshot>, expires_at: DateTime<Utc>) -> u64 {
        self.remove(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                snapshot,
                expires_at,
                inserted_seq: seq,
            },
        );
        seq
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Evict oldest entries until at most `limit` remain.
    fn evict_down_to(&mut self, limit: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > limit {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            tracing::debug!(key = %key, "Evicted oldest cache entry");
            evicted += 1;
        }
        evicted
    }
}

/// Thread-safe snapshot table. All operations take a single mutex and never
/// suspend.
pub struct CacheStore {
    table: Mutex<Table>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Create a store holding at most `max_entries` snapshots (minimum 1).
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Get a live snapshot.
    ///
    /// Returns `None` if the key was never set or its entry has expired; an
    /// expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<Arc<WalletSnapshot>> {
        self.get_entry(key).map(|entry| entry.snapshot)
    }

    /// Like [`CacheStore::get`], but also yields the entry's expiry and version.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut table = self.table.lock();

        match table.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.clone()),
            Some(_) => {
                table.remove(key);
                tracing::trace!(key = %key, "Lazily evicted expired entry");
                None
            }
            None => None,
        }
    }

    /// Whether a live entry exists, without touching it.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.table
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Insert or replace a snapshot, expiring `ttl` after its fetch time.
    ///
    /// Replacing a key moves it to the back of the eviction order. Returns the
    /// number of entries evicted to make room.
    pub fn set(&self, key: &str, snapshot: Arc<WalletSnapshot>, ttl: Duration) -> usize {
        self.set_versioned(key, snapshot, ttl).evicted
    }

    /// [`CacheStore::set`], also reporting the version given to the new entry.
    pub fn set_versioned(&self, key: &str, snapshot: Arc<WalletSnapshot>, ttl: Duration) -> Stored {
        let expires_at = snapshot
            .fetched_at
            .checked_add_signed(to_time_delta(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.insert(key, snapshot, expires_at)
    }

    /// Re-insert a persisted entry with its original expiry. Already-expired
    /// entries are ignored. Returns whether the entry was stored.
    pub fn restore(
        &self,
        key: &str,
        snapshot: Arc<WalletSnapshot>,
        expires_at: DateTime<Utc>,
    ) -> bool {
        if expires_at <= self.clock.now() {
            return false;
        }
        self.insert(key, snapshot, expires_at);
        true
    }

    fn insert(&self, key: &str, snapshot: Arc<WalletSnapshot>, expires_at: DateTime<Utc>) -> Stored {
        let now = self.clock.now();
        let mut table = self.table.lock();

        let mut evicted = 0;
        if !table.entries.contains_key(key) && table.entries.len() >= self.max_entries {
            evicted += table.purge_expired(now);
            evicted += table.evict_down_to(self.max_entries - 1);
        }

        let version = table.insert(key.to_string(), snapshot, expires_at);
        Stored { evicted, version }
    }

    /// Remove a key. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.table.lock().remove(key).is_some()
    }

    /// Remove every entry and reset eviction bookkeeping.
    pub fn clear(&self) {
        let mut table = self.table.lock();
        table.entries.clear();
        table.order.clear();
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        self.table.lock().purge_expired(now)
    }

    /// Evict oldest entries until the store is within capacity.
    pub fn enforce_capacity(&self) -> usize {
        self.table.lock().evict_down_to(self.max_entries)
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Copy of all entries, oldest-inserted first.
    pub fn entries(&self) -> Vec<(String, CacheEntry)> {
        let table = self.table.lock();
        table
            .order
            .values()
            .filter_map(|key| {
                table
                    .entries
                    .get(key)
                    .map(|entry| (key.clone(), entry.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("max_entries", &self.max_entries)
            .field("entries", &self.size())
            .finish()
    }
}
