//! Wallet data manager.
//!
//! Serves wallet snapshots to many concurrent callers. Reads are answered
//! from the [`CacheStore`] while fresh; misses go through the
//! [`FetchCoordinator`] so each address has at most one network fetch in
//! flight. Every fetched snapshot with at least some data is cached,
//! mirrored to persistence and pushed to subscribers. A fetch where every
//! part failed is reported to the caller and not cached, so the next read
//! retries.
//!
//! A background task periodically sweeps expired entries. It is stopped by
//! [`WalletDataManager::shutdown`], or signalled to stop when the manager is
//! dropped.

use crate::cache::{CacheStore, FetchCoordinator, PersistenceAdapter, Subscription, SubscriptionHub};
use crate::client::WalletApi;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheSettings;
use crate::domain::{ValidationError, WalletAddress};
use crate::error::{ExplorerApiResult, FetchError, FetchResult};
use crate::metrics::Metrics;
use crate::models::WalletSnapshot;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Occupancy counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub in_flight: usize,
    pub subscribers: usize,
}

struct ManagerInner {
    api: Arc<dyn WalletApi>,
    cache: Arc<CacheStore>,
    coordinator: FetchCoordinator,
    hub: SubscriptionHub,
    persistence: Option<PersistenceAdapter>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    metrics: Metrics,
}

struct Maintenance {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Builder for [`WalletDataManager`].
pub struct WalletDataManagerBuilder {
    api: Arc<dyn WalletApi>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    persistence: Option<PersistenceAdapter>,
    metrics: Metrics,
}

impl WalletDataManagerBuilder {
    pub fn settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Mirror the cache into durable storage and warm from it on build.
    pub fn persistence(mut self, persistence: PersistenceAdapter) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the manager, warm its cache and start the sweep task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> WalletDataManager {
        let cache = Arc::new(CacheStore::new(self.settings.max_entries, Arc::clone(&self.clock)));

        if let Some(persistence) = &self.persistence {
            let restored = persistence.warm(&cache);
            tracing::info!(restored, "Warmed wallet cache from persistence");
        }

        let inner = Arc::new(ManagerInner {
            api: self.api,
            cache,
            coordinator: FetchCoordinator::new(),
            hub: SubscriptionHub::new(),
            persistence: self.persistence,
            clock: self.clock,
            settings: self.settings,
            metrics: self.metrics,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = spawn_maintenance(Arc::clone(&inner), shutdown_rx);

        WalletDataManager {
            inner,
            maintenance: Mutex::new(Some(Maintenance { shutdown, handle })),
        }
    }
}

/// Shared, explicitly owned wallet data cache.
pub struct WalletDataManager {
    inner: Arc<ManagerInner>,
    maintenance: Mutex<Option<Maintenance>>,
}

impl WalletDataManager {
    /// Create a manager with the system clock and no persistence.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(api: Arc<dyn WalletApi>, settings: CacheSettings) -> Self {
        Self::builder(api).settings(settings).build()
    }

    pub fn builder(api: Arc<dyn WalletApi>) -> WalletDataManagerBuilder {
        WalletDataManagerBuilder {
            api,
            settings: CacheSettings::default(),
            clock: Arc::new(SystemClock),
            persistence: None,
            metrics: Metrics::new(),
        }
    }

    /// Snapshot for `address`.
    ///
    /// A live cache entry is returned without a network call (and re-published
    /// to subscribers) unless `force_refresh` is set. Otherwise the snapshot is
    /// fetched, joining any fetch already running for the address.
    ///
    /// Partial sub-fetch failures never surface here; they are recorded in
    /// the snapshot's `error`. Errors are limited to invalid addresses, fetches
    /// where every part failed (`FetchError::Failed`, nothing cached) and
    /// coordination faults.
    pub async fn get(&self, address: &str, force_refresh: bool) -> FetchResult<Arc<WalletSnapshot>> {
        ManagerInner::get(&self.inner, address, force_refresh).await
    }

    /// Fetch several addresses concurrently.
    ///
    /// One address failing never affects the others; it is reported as an
    /// empty snapshot carrying the error. Keys of the result are the
    /// addresses as given.
    pub async fn batch_get<S: AsRef<str>>(
        &self,
        addresses: &[S],
        force_refresh: bool,
    ) -> HashMap<String, Arc<WalletSnapshot>> {
        let fetches = addresses.iter().map(|address| {
            let address = address.as_ref();
            async move {
                let snapshot = match self.get(address, force_refresh).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!(address = %address, error = %e, "Batch fetch failed");
                        Arc::new(WalletSnapshot::failed(address, self.now(), e.to_string()))
                    }
                };
                (address.to_string(), snapshot)
            }
        });

        join_all(fetches).await.into_iter().collect()
    }

    /// Warm the cache for every address not already cached.
    ///
    /// Runs in the background; failures are logged only. The returned handle
    /// may be awaited or dropped.
    pub fn preload<S: AsRef<str>>(&self, addresses: &[S]) -> JoinHandle<()> {
        let missing: Vec<WalletAddress> = addresses
            .iter()
            .filter_map(|address| match WalletAddress::new(address.as_ref()) {
                Ok(address) => Some(address),
                Err(e) => {
                    tracing::warn!(address = %address.as_ref(), error = %e, "Skipping preload");
                    None
                }
            })
            .filter(|address| !self.inner.cache.contains(&address.cache_key()))
            .collect();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if missing.is_empty() {
                return;
            }
            tracing::debug!(count = missing.len(), "Preloading wallets");
            let fetches = missing
                .iter()
                .map(|address| ManagerInner::get(&inner, address.as_str(), false));
            for (address, result) in missing.iter().zip(join_all(fetches).await) {
                if let Err(e) = result {
                    tracing::warn!(address = %address, error = %e, "Preload failed");
                }
            }
        })
    }

    /// Observe updates for `address`. Does not fetch.
    pub fn subscribe<F>(&self, address: &str, listener: F) -> Result<Subscription, ValidationError>
    where
        F: Fn(&Arc<WalletSnapshot>) + Send + Sync + 'static,
    {
        let address = WalletAddress::new(address)?;
        Ok(self.inner.hub.subscribe(&address.cache_key(), Arc::new(listener)))
    }

    /// Drop the cached snapshot for one address, or everything.
    ///
    /// Subscriptions are kept. A fetch already in flight still stores its
    /// result when it completes.
    pub fn clear(&self, address: Option<&str>) {
        match address {
            Some(address) => match WalletAddress::new(address) {
                Ok(address) => {
                    if self.inner.cache.delete(&address.cache_key()) {
                        tracing::debug!(address = %address, "Cleared cached wallet");
                        // Fire and forget; the write reads the table when it runs
                        drop(self.inner.persist());
                    }
                }
                Err(e) => tracing::warn!(address = %address, error = %e, "Ignoring clear"),
            },
            None => {
                self.inner.cache.clear();
                if let Some(persistence) = &self.inner.persistence {
                    persistence.clear();
                }
                tracing::info!("Cleared wallet cache");
            }
        }
    }

    /// Run one maintenance pass immediately. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.cache.size(),
            max_entries: self.inner.cache.max_entries(),
            in_flight: self.inner.coordinator.in_flight_count(),
            subscribers: self.inner.hub.total_subscribers(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Current time according to the manager's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Stop the sweep task and wait for it to finish. Idempotent.
    pub async fn shutdown(&self) {
        let maintenance = self.maintenance.lock().take();
        let Some(Maintenance { shutdown, handle }) = maintenance else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Maintenance task ended abnormally");
        }
        tracing::info!("Wallet data manager shut down");
    }
}

impl Drop for WalletDataManager {
    fn drop(&mut self) {
        if let Some(maintenance) = self.maintenance.get_mut().take() {
            let _ = maintenance.shutdown.send(true);
        }
    }
}

impl std::fmt::Debug for WalletDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletDataManager")
            .field("stats", &self.cache_stats())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl ManagerInner {
    async fn get(
        this: &Arc<Self>,
        address: &str,
        force_refresh: bool,
    ) -> FetchResult<Arc<WalletSnapshot>> {
        let address =
            WalletAddress::new(address).map_err(|e| FetchError::InvalidAddress(e.to_string()))?;
        let key = address.cache_key();

        if !force_refresh {
            if let Some(entry) = this.cache.get_entry(&key) {
                tracing::debug!(key = %key, "Cache hit");
                this.metrics.record_cache_hit();
                this.hub.publish(&key, &entry.snapshot, entry.version());
                return Ok(entry.snapshot);
            }
        }

        tracing::debug!(key = %key, force_refresh, "Cache miss");
        this.metrics.record_cache_miss();

        let inner = Arc::clone(this);
        let producer = async move { inner.load(address).await };
        this.coordinator.run_exclusive(&key, producer).await
    }

    /// Fetch, cache, persist and publish a fresh snapshot.
    async fn load(&self, address: WalletAddress) -> FetchResult<Arc<WalletSnapshot>> {
        let addr = address.as_str();
        let (balance, tokens, nfts, transactions) = tokio::join!(
            self.api.fetch_balance(addr),
            self.api.fetch_tokens(addr),
            self.api.fetch_nfts(addr),
            self.api.fetch_transactions(addr, self.settings.transaction_limit),
        );
        let all_failed =
            balance.is_err() && tokens.is_err() && nfts.is_err() && transactions.is_err();

        // First failure wins, in field order
        let mut error = None;
        let balance = self.field_or_default(addr, "balance", balance, &mut error);
        let tokens = self.field_or_default(addr, "tokens", tokens, &mut error);
        let nfts = self.field_or_default(addr, "nfts", nfts, &mut error);
        let transactions = self.field_or_default(addr, "transactions", transactions, &mut error);

        if all_failed {
            let error = error.unwrap_or_default();
            tracing::warn!(address = %addr, error = %error, "Every sub-fetch failed; not caching");
            return Err(FetchError::Failed(error));
        }

        let snapshot = Arc::new(WalletSnapshot::new(
            addr,
            balance,
            tokens,
            nfts,
            transactions,
            self.clock.now(),
            error,
        ));
        self.metrics.record_snapshot_fetched();

        let key = address.cache_key();
        let stored = self.cache.set_versioned(&key, Arc::clone(&snapshot), self.settings.ttl);
        if stored.evicted > 0 {
            tracing::debug!(key = %key, evicted = stored.evicted, "Evicted wallets to make room");
            self.metrics.record_evictions(stored.evicted);
        }
        if let Some(write) = self.persist() {
            if let Err(e) = write.await {
                tracing::warn!(key = %key, error = %e, "Persistence task failed");
            }
        }
        self.hub.publish(&key, &snapshot, stored.version);

        Ok(snapshot)
    }

    fn field_or_default<T: Default>(
        &self,
        address: &str,
        field: &str,
        result: ExplorerApiResult<T>,
        first_error: &mut Option<String>,
    ) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(address = %address, field = %field, error = %e, "Sub-fetch failed");
                self.metrics.record_sub_fetch_error();
                if first_error.is_none() {
                    *first_error = Some(format!("Failed to fetch {}: {}", field, e));
                }
                T::default()
            }
        }
    }

    /// Start mirroring the table to durable storage, off the async workers.
    fn persist(&self) -> Option<JoinHandle<()>> {
        self.persistence
            .as_ref()
            .map(|persistence| persistence.save_in_background(&self.cache))
    }

    fn sweep(&self) -> usize {
        let removed = self.cache.sweep_expired() + self.cache.enforce_capacity();
        if removed > 0 {
            tracing::debug!(removed, "Swept wallet cache");
            self.metrics.record_evictions(removed);
            drop(self.persist());
        }
        removed
    }
}

fn spawn_maintenance(inner: Arc<ManagerInner>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let period = inner.settings.sweep_interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    inner.sweep();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Maintenance task stopped");
    })
}
