//! Per-key fan-out of snapshot updates.
//!
//! Listeners are invoked synchronously, in registration order, once per
//! accepted update. The listener list is copied before delivery, so a listener
//! may unsubscribe itself or others without disturbing the current round.
//! A panicking listener is logged and skipped; the rest still receive the
//! update.
//!
//! Deliveries for one key never interleave. Versioned updates (see
//! [`SubscriptionHub::publish`]) older than the last one delivered for the key
//! are dropped, so listeners always end on the newest write.

use crate::models::WalletSnapshot;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// Callback invoked with each new snapshot for a key.
pub type Listener = Arc<dyn Fn(&Arc<WalletSnapshot>) + Send + Sync>;

/// Per-key delivery lock holding the newest version delivered so far.
/// Reentrant so a listener may trigger a nested delivery for its own key.
type Gate = Arc<ReentrantMutex<Cell<u64>>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, Listener)>>,
    gates: HashMap<String, Gate>,
}

impl Registry {
    fn remove(&mut self, key: &str, id: u64) -> bool {
        let Some(listeners) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            self.listeners.remove(key);
            self.gates.remove(key);
        }
        removed
    }

    fn gate(&mut self, key: &str) -> Option<Gate> {
        if !self.listeners.contains_key(key) {
            return None;
        }
        let gate = self
            .gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(Cell::new(0))));
        Some(Arc::clone(gate))
    }

    fn snapshot_listeners(&self, key: &str) -> Vec<Listener> {
        self.listeners
            .get(key)
            .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }
}

/// Registry of listeners keyed by cache key.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    registry: Arc<Mutex<Registry>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for updates to `key`.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(key.to_string())
            .or_default()
            .push((id, listener));

        tracing::trace!(key = %key, subscription_id = id, "Subscribed");
        Subscription {
            registry: Arc::downgrade(&self.registry),
            key: key.to_string(),
            id,
            active: true,
        }
    }

    /// Deliver `snapshot` to every listener of `key`, unconditionally. Returns
    /// the number of listeners that completed without panicking.
    pub fn notify(&self, key: &str, snapshot: &Arc<WalletSnapshot>) -> usize {
        self.deliver(key, snapshot, None)
    }

    /// Deliver `snapshot` written at cache `version`.
    ///
    /// Dropped if a newer version was already delivered for `key`; an equal
    /// version (a cache hit re-publishing the current entry) is delivered.
    pub fn publish(&self, key: &str, snapshot: &Arc<WalletSnapshot>, version: u64) -> usize {
        self.deliver(key, snapshot, Some(version))
    }

    fn deliver(&self, key: &str, snapshot: &Arc<WalletSnapshot>, version: Option<u64>) -> usize {
        let Some(gate) = self.registry.lock().gate(key) else {
            return 0;
        };
        let guard = gate.lock();
        let newest: &Cell<u64> = &guard;

        let is_stale = |newest: &Cell<u64>| version.is_some_and(|v| v < newest.get());
        if is_stale(newest) {
            tracing::trace!(key = %key, ?version, "Dropped stale notification");
            return 0;
        }
        if let Some(version) = version {
            newest.set(version);
        }

        let listeners = self.registry.lock().snapshot_listeners(key);
        let mut delivered = 0;
        for listener in listeners {
            // A nested delivery from inside a listener may have superseded us
            if is_stale(newest) {
                break;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(key = %key, "Subscriber panicked during notification");
                }
            }
        }
        delivered
    }

    /// Number of listeners registered for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.registry
            .lock()
            .listeners
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Number of listeners across all keys.
    pub fn total_subscribers(&self) -> usize {
        self.registry.lock().listeners.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// Handle owning one registered listener.
///
/// Dropping the handle unsubscribes. Keep it alive for as long as updates are
/// wanted.
#[must_use = "dropping a Subscription immediately unsubscribes its listener"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    key: String,
    id: u64,
    active: bool,
}

impl Subscription {
    /// The cache key this subscription observes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop receiving updates.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            if registry.lock().remove(&self.key, self.id) {
                tracing::trace!(key = %self.key, subscription_id = self.id, "Unsubscribed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
