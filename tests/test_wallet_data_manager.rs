//! Integration tests for WalletDataManager using the mock explorer API.

mod mocks;

use futures::future::join_all;
use mocks::{sample_wallet, MockWalletApi};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wallet_cache::cache::persistence::DEFAULT_STORAGE_KEY;
use wallet_cache::{
    CacheSettings, DurableStore, FetchError, ManualClock, MemoryStore, PersistenceAdapter,
    Subscription, WalletDataManager, WalletSnapshot,
};

const A: &str = "1AddrA";
const B: &str = "1AddrB";
const C: &str = "1AddrC";

fn api_with(addresses: &[&str]) -> MockWalletApi {
    let api = MockWalletApi::new();
    for address in addresses {
        api.add_wallet(address, sample_wallet());
    }
    api
}

fn manager(api: &MockWalletApi, clock: &Arc<ManualClock>, settings: CacheSettings) -> WalletDataManager {
    WalletDataManager::builder(Arc::new(api.clone()))
        .settings(settings)
        .clock(clock.clone())
        .build()
}

fn recorder() -> (Arc<Mutex<Vec<Arc<WalletSnapshot>>>>, impl Fn(&Arc<WalletSnapshot>) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |snapshot: &Arc<WalletSnapshot>| {
        sink.lock().unwrap().push(snapshot.clone())
    })
}

#[tokio::test]
async fn test_concurrent_gets_share_one_fetch() {
    let api = api_with(&[A]);
    api.set_delay(Duration::from_millis(50));
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let results = join_all((0..10).map(|_| manager.get(A, false))).await;

    let first = results[0].as_ref().unwrap().clone();
    for result in &results {
        assert_eq!(**result.as_ref().unwrap(), *first);
    }
    assert_eq!(api.get_call_count("fetch_balance"), 1);
    assert_eq!(api.get_call_count("fetch_tokens"), 1);
    assert_eq!(api.get_call_count("fetch_nfts"), 1);
    assert_eq!(api.get_call_count("fetch_transactions"), 1);
    assert_eq!(manager.cache_stats().in_flight, 0);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_across_tasks_share_one_fetch() {
    let api = api_with(&[A]);
    api.set_delay(Duration::from_millis(50));
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = Arc::new(manager(&api, &clock, CacheSettings::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get(A, false).await })
        })
        .collect();

    for handle in handles {
        let snapshot = handle.await.unwrap().unwrap();
        assert_eq!(snapshot.address, A);
    }
    assert_eq!(api.total_calls_for(A), 4);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_ttl_boundary() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let first = tokio_test::assert_ok!(manager.get(A, false).await);
    assert_eq!(api.get_call_count("fetch_balance"), 1);

    clock.set_millis(29_999);
    let cached = manager.get(A, false).await.unwrap();
    assert!(Arc::ptr_eq(&first, &cached));
    assert_eq!(api.get_call_count("fetch_balance"), 1);

    clock.set_millis(30_001);
    let fresh = manager.get(A, false).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(api.get_call_count("fetch_balance"), 2);
    assert_eq!(fresh.fetched_at.timestamp_millis(), 30_001);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    manager.get(A, false).await.unwrap();
    manager.get(A, true).await.unwrap();

    assert_eq!(api.get_call_count("fetch_balance"), 2);
    assert_eq!(manager.metrics().cache_misses_total(), 2);
    assert_eq!(manager.metrics().cache_hits_total(), 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_partial_failure_keeps_other_fields() {
    let api = api_with(&[A]);
    api.fail(A, "fetch_tokens");
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let snapshot = manager.get(A, false).await.unwrap();

    assert_eq!(snapshot.balance.available, 10.0);
    assert!(snapshot.tokens.is_empty());
    assert_eq!(snapshot.nfts.len(), 1);
    assert_eq!(snapshot.transactions.len(), 2);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Failed to fetch tokens: Request timeout")
    );
    assert_eq!(manager.metrics().sub_fetch_errors_total(), 1);

    // Still cached and live
    clock.set_millis(10_000);
    let again = manager.get(A, false).await.unwrap();
    assert!(Arc::ptr_eq(&snapshot, &again));
    assert_eq!(api.get_call_count("fetch_tokens"), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_first_error_follows_field_order() {
    let api = api_with(&[A]);
    api.fail(A, "fetch_transactions");
    api.fail(A, "fetch_nfts");
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let snapshot = manager.get(A, false).await.unwrap();

    assert_eq!(
        snapshot.error.as_deref(),
        Some("Failed to fetch nfts: Request timeout")
    );
    assert!(snapshot.nfts.is_empty());
    assert!(snapshot.transactions.is_empty());
    assert_eq!(snapshot.tokens.len(), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_transaction_limit_is_passed_through() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let settings = CacheSettings {
        transaction_limit: 1,
        ..Default::default()
    };
    let manager = manager(&api, &clock, settings);

    let snapshot = manager.get(A, false).await.unwrap();
    assert_eq!(snapshot.transactions.len(), 1);
    assert_eq!(snapshot.transactions[0].hash, "tx-new");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_invalid_address_is_rejected() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let result = manager.get("0OIl", false).await;
    assert!(matches!(result, Err(FetchError::InvalidAddress(_))));
    assert_eq!(api.get_call_count("fetch_balance"), 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    // A is unknown to the explorer, B is served normally
    let api = api_with(&[B]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let results = manager.batch_get(&[A, B, "not-base58!"], false).await;

    assert_eq!(results.len(), 3);
    let a = &results[A];
    assert!(a.error.as_deref().unwrap().starts_with("Failed to fetch balance"));
    assert!(a.tokens.is_empty());

    let b = &results[B];
    assert!(b.error.is_none());
    assert_eq!(b.tokens.len(), 2);

    let invalid = &results["not-base58!"];
    assert!(invalid.error.as_deref().unwrap().contains("Invalid wallet address"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_subscribers_receive_every_update_in_order() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let (first_seen, first) = recorder();
    let (second_seen, second) = recorder();
    let _s1 = manager.subscribe(A, first).unwrap();
    let _s2 = manager.subscribe(A, second).unwrap();

    // Subscribing alone does not fetch
    assert_eq!(api.total_calls_for(A), 0);

    manager.get(A, false).await.unwrap();
    clock.set_millis(1_000);
    manager.get(A, true).await.unwrap();

    let stamps = |seen: &Arc<Mutex<Vec<Arc<WalletSnapshot>>>>| -> Vec<i64> {
        seen.lock()
            .unwrap()
            .iter()
            .map(|s| s.fetched_at.timestamp_millis())
            .collect()
    };
    assert_eq!(stamps(&first_seen), vec![0, 1_000]);
    assert_eq!(stamps(&second_seen), vec![0, 1_000]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_cache_hit_is_republished() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let (seen, listener) = recorder();
    let _subscription = manager.subscribe(A, listener).unwrap();

    manager.get(A, false).await.unwrap();
    manager.get(A, false).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(Arc::ptr_eq(&seen[0], &seen[1]));
}

#[tokio::test]
async fn test_unsubscribe_during_delivery() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let first_calls = Arc::new(Mutex::new(0usize));

    let own_slot = slot.clone();
    let counter = first_calls.clone();
    let first = manager
        .subscribe(A, move |_snapshot: &Arc<WalletSnapshot>| {
            *counter.lock().unwrap() += 1;
            let subscription = own_slot.lock().unwrap().take();
            if let Some(subscription) = subscription {
                subscription.unsubscribe();
            }
        })
        .unwrap();
    *slot.lock().unwrap() = Some(first);

    let (second_seen, second) = recorder();
    let _s2 = manager.subscribe(A, second).unwrap();

    manager.get(A, false).await.unwrap();
    manager.get(A, true).await.unwrap();

    assert_eq!(*first_calls.lock().unwrap(), 1);
    assert_eq!(second_seen.lock().unwrap().len(), 2);
    assert_eq!(manager.cache_stats().subscribers, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_block_others() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    let _bad = manager
        .subscribe(A, |_snapshot: &Arc<WalletSnapshot>| panic!("listener failure"))
        .unwrap();
    let (seen, listener) = recorder();
    let _good = manager.subscribe(A, listener).unwrap();

    let snapshot = manager.get(A, false).await.unwrap();

    assert_eq!(snapshot.address, A);
    assert_eq!(seen.lock().unwrap().len(), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_eviction_example_scenario() {
    let api = api_with(&[A, B, C]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let settings = CacheSettings {
        ttl: Duration::from_millis(30_000),
        max_entries: 2,
        ..Default::default()
    };
    let manager = manager(&api, &clock, settings);

    manager.get(A, false).await.unwrap();
    clock.set_millis(1_000);
    manager.get(B, false).await.unwrap();
    clock.set_millis(2_000);
    manager.get(C, false).await.unwrap();

    assert_eq!(manager.cache_stats().entries, 2);
    assert_eq!(manager.metrics().evictions_total(), 1);

    clock.set_millis(2_500);
    manager.get(B, false).await.unwrap();
    assert_eq!(api.get_call_count_for("fetch_balance", B), 1);

    manager.get(A, false).await.unwrap();
    assert_eq!(api.get_call_count_for("fetch_balance", A), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_clear_one_and_all() {
    let api = api_with(&[A, B]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());
    let (_seen, listener) = recorder();
    let _subscription = manager.subscribe(A, listener).unwrap();

    manager.get(A, false).await.unwrap();
    manager.get(B, false).await.unwrap();

    manager.clear(Some(A));
    assert_eq!(manager.cache_stats().entries, 1);
    manager.get(A, false).await.unwrap();
    assert_eq!(api.get_call_count_for("fetch_balance", A), 2);

    manager.clear(None);
    assert_eq!(manager.cache_stats().entries, 0);
    assert_eq!(manager.cache_stats().subscribers, 1);

    manager.get(B, false).await.unwrap();
    assert_eq!(api.get_call_count_for("fetch_balance", B), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_preload_fetches_only_missing() {
    let api = api_with(&[A, B]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    manager.get(A, false).await.unwrap();
    manager.preload(&[A, B, "bad address"]).await.unwrap();

    assert_eq!(api.get_call_count_for("fetch_balance", A), 1);
    assert_eq!(api.get_call_count_for("fetch_balance", B), 1);
    assert_eq!(manager.cache_stats().entries, 2);

    // Everything cached: nothing to do
    manager.preload(&[A, B]).await.unwrap();
    assert_eq!(api.get_call_count("fetch_balance"), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_preload_swallows_failures() {
    let api = MockWalletApi::new();
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    manager.preload(&[A]).await.unwrap();

    // Nothing was fetched, so nothing is cached and the next read retries
    assert_eq!(manager.cache_stats().entries, 0);
    let result = manager.get(A, false).await;
    assert!(matches!(result, Err(FetchError::Failed(_))));
    assert_eq!(api.get_call_count("fetch_balance"), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_total_failure_is_not_cached_and_recovers() {
    let api = MockWalletApi::new();
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());
    let (seen, listener) = recorder();
    let _subscription = manager.subscribe(A, listener).unwrap();

    let first = manager.get(A, false).await;
    assert_eq!(
        first.unwrap_err().to_string(),
        "Failed to fetch balance: Resource not found: Address 1AddrA not found"
    );
    assert_eq!(manager.cache_stats().entries, 0);
    assert_eq!(manager.metrics().snapshots_fetched_total(), 0);
    assert!(seen.lock().unwrap().is_empty());

    api.add_wallet(A, sample_wallet());
    clock.set_millis(1_000);

    let second = manager.get(A, false).await.unwrap();
    assert!(second.error.is_none());
    assert_eq!(second.tokens.len(), 2);
    assert_eq!(api.get_call_count("fetch_balance"), 2);
    assert_eq!(seen.lock().unwrap().len(), 1);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_hit_republish_never_overtakes_newer_write() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = Arc::new(manager(&api, &clock, CacheSettings::default()));
    manager.get(A, false).await.unwrap();

    // The first listener stalls on the cache-hit republish of the t=0 snapshot
    let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let entered_tx = Mutex::new(Some(entered_tx));
    let release_rx = Mutex::new(release_rx);
    let _stalling = manager
        .subscribe(A, move |snapshot: &Arc<WalletSnapshot>| {
            if snapshot.fetched_at.timestamp_millis() == 0 {
                if let Some(tx) = entered_tx.lock().unwrap().take() {
                    tx.send(()).unwrap();
                    release_rx.lock().unwrap().recv().unwrap();
                }
            }
        })
        .unwrap();
    let (seen, listener) = recorder();
    let _second = manager.subscribe(A, listener).unwrap();

    let hit = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.get(A, false).await })
    };
    tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
        .await
        .unwrap();

    clock.set_millis(1_000);
    let refresh = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.get(A, true).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    release_tx.send(()).unwrap();

    hit.await.unwrap().unwrap();
    refresh.await.unwrap().unwrap();

    let order: Vec<i64> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|snapshot| snapshot.fetched_at.timestamp_millis())
        .collect();
    assert_eq!(order.last(), Some(&1_000));
    assert!(order.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", order);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetches_persist_every_wallet() {
    let store = Arc::new(MemoryStore::new());
    let api = api_with(&[A, B, C]);
    api.set_delay(Duration::from_millis(10));
    let manager = WalletDataManager::builder(Arc::new(api.clone()))
        .clock(Arc::new(ManualClock::at_millis(0)))
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();

    manager.batch_get(&[A, B, C], false).await;

    let mut keys: Vec<String> = PersistenceAdapter::new(store.clone())
        .load()
        .into_iter()
        .map(|entry| entry.key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["wallet:1AddrA", "wallet:1AddrB", "wallet:1AddrC"]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_warm_start_from_persistence() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at_millis(0));

    let first_api = api_with(&[A]);
    let first = WalletDataManager::builder(Arc::new(first_api.clone()))
        .clock(clock.clone())
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();
    first.get(A, false).await.unwrap();
    first.shutdown().await;
    drop(first);

    let second_api = api_with(&[A]);
    clock.set_millis(5_000);
    let second = WalletDataManager::builder(Arc::new(second_api.clone()))
        .clock(clock.clone())
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();

    assert_eq!(second.cache_stats().entries, 1);
    let snapshot = second.get(A, false).await.unwrap();
    assert_eq!(snapshot.tokens.len(), 2);
    assert_eq!(second_api.total_calls_for(A), 0);

    second.shutdown().await;
}

#[tokio::test]
async fn test_expired_persisted_entries_are_not_restored() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at_millis(0));

    let first = WalletDataManager::builder(Arc::new(api_with(&[A])))
        .clock(clock.clone())
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();
    first.get(A, false).await.unwrap();
    first.shutdown().await;

    clock.set_millis(31_000);
    let api = api_with(&[A]);
    let second = WalletDataManager::builder(Arc::new(api.clone()))
        .clock(clock.clone())
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();

    assert_eq!(second.cache_stats().entries, 0);
    second.get(A, false).await.unwrap();
    assert_eq!(api.get_call_count("fetch_balance"), 1);

    second.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_persistence_degrades_to_cold_cache() {
    let store = Arc::new(MemoryStore::new());
    store.set(DEFAULT_STORAGE_KEY, b"{not json").unwrap();
    let clock = Arc::new(ManualClock::at_millis(0));

    let api = api_with(&[A]);
    let manager = WalletDataManager::builder(Arc::new(api.clone()))
        .clock(clock.clone())
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();

    assert_eq!(manager.cache_stats().entries, 0);
    assert!(store.get(DEFAULT_STORAGE_KEY).unwrap().is_none());

    manager.get(A, false).await.unwrap();
    assert!(store.get(DEFAULT_STORAGE_KEY).unwrap().is_some());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_clear_all_removes_persisted_document() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = WalletDataManager::builder(Arc::new(api_with(&[A])))
        .clock(clock.clone())
        .persistence(PersistenceAdapter::new(store.clone()))
        .build();

    manager.get(A, false).await.unwrap();
    assert!(store.get(DEFAULT_STORAGE_KEY).unwrap().is_some());

    manager.clear(None);
    assert!(store.get(DEFAULT_STORAGE_KEY).unwrap().is_none());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_manual_sweep_removes_expired() {
    let api = api_with(&[A, B]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    manager.get(A, false).await.unwrap();
    clock.set_millis(20_000);
    manager.get(B, false).await.unwrap();

    clock.set_millis(40_000);
    assert_eq!(manager.sweep(), 1);
    assert_eq!(manager.cache_stats().entries, 1);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_sweep_runs_on_interval() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let settings = CacheSettings {
        sweep_interval: Duration::from_secs(1),
        ..Default::default()
    };
    let manager = manager(&api, &clock, settings);

    manager.get(A, false).await.unwrap();
    assert_eq!(manager.cache_stats().entries, 1);

    clock.set_millis(60_000);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(manager.cache_stats().entries, 0);
    assert_eq!(manager.metrics().evictions_total(), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let api = api_with(&[A]);
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = manager(&api, &clock, CacheSettings::default());

    manager.shutdown().await;
    manager.shutdown().await;

    // Reads keep working without the sweep task
    let snapshot = manager.get(A, false).await.unwrap();
    assert_eq!(snapshot.address, A);
}
