//! Per-key fetch deduplication.
//!
//! At most one producer runs per key. Callers that arrive while a fetch is in
//! flight await the same shared future and observe the same result, success
//! or failure.
//!
//! The producer runs as its own Tokio task, so it completes (and its result is
//! cached) even if every caller that was waiting on it is dropped. The
//! in-flight entry is removed by that task before the task's result becomes
//! visible to any waiter; a call made after a fetch has resolved always starts
//! a new producer.
//!
//! There is no timeout here. A producer that never completes keeps its key in
//! flight forever; the HTTP client is expected to enforce its own deadline.

use crate::error::{CoordinationError, FetchResult};
use crate::models::WalletSnapshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type SharedFetch = Shared<BoxFuture<'static, FetchResult<Arc<WalletSnapshot>>>>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

type InFlightTable = Arc<Mutex<HashMap<String, InFlight>>>;

/// Deduplicates concurrent fetches for the same key.
#[derive(Clone, Default)]
pub struct FetchCoordinator {
    in_flight: InFlightTable,
    next_id: Arc<AtomicU64>,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` for `key`, or join the fetch already running for it.
    ///
    /// When joining, `producer` is dropped without being polled.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn run_exclusive<F>(&self, key: &str, producer: F) -> FetchResult<Arc<WalletSnapshot>>
    where
        F: Future<Output = FetchResult<Arc<WalletSnapshot>>> + Send + 'static,
    {
        let fetch = {
            let mut table = self.in_flight.lock();
            match table.get(key) {
                Some(existing) => {
                    tracing::debug!(key = %key, "Joining in-flight fetch");
                    existing.fetch.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.launch(key.to_string(), id, producer);
                    table.insert(
                        key.to_string(),
                        InFlight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    tracing::debug!(key = %key, fetch_id = id, "Started fetch");
                    fetch
                }
            }
        };

        fetch.await
    }

    fn launch<F>(&self, key: String, id: u64, producer: F) -> SharedFetch
    where
        F: Future<Output = FetchResult<Arc<WalletSnapshot>>> + Send + 'static,
    {
        let table = Arc::clone(&self.in_flight);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = producer.await;
            release(&table, &task_key, id);
            result
        });

        let table = Arc::clone(&self.in_flight);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    // The task never reached its own release
                    release(&table, &key, id);
                    tracing::error!(key = %key, error = %join_error, "Fetch task aborted");
                    Err(CoordinationError::ProducerAborted {
                        key,
                        reason: join_error.to_string(),
                    }
                    .into())
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Whether a fetch for `key` is currently running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Number of keys with a running fetch.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Remove the in-flight entry for `key`, but only if it still belongs to fetch `id`.
fn release(table: &InFlightTable, key: &str, id: u64) {
    let mut table = table.lock();
    if table.get(key).is_some_and(|entry| entry.id == id) {
        table.remove(key);
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}
