//! Basic metrics instrumentation for tracking performance.
//!
//! Provides counters for HTTP requests and cache activity, plus a rolling
//! window of load times. All of it is advisory; nothing here feeds back into
//! caching decisions.

mod load_window;

pub use load_window::LoadTimeWindow;

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counters {
    http_requests: AtomicU64,
    http_errors: AtomicU64,
    http_duration_ms: AtomicU64,
    /// Reads answered from the cache
    cache_hits: AtomicU64,
    /// Reads that went to the network, forced refreshes included
    cache_misses: AtomicU64,
    snapshots_fetched: AtomicU64,
    /// Individual balance/token/nft/transaction fetches that failed
    sub_fetch_errors: AtomicU64,
    /// Entries removed by expiry or capacity
    evictions: AtomicU64,
}

impl Counters {
    fn all(&self) -> [&AtomicU64; 8] {
        [
            &self.http_requests,
            &self.http_errors,
            &self.http_duration_ms,
            &self.cache_hits,
            &self.cache_misses,
            &self.snapshots_fetched,
            &self.sub_fetch_errors,
            &self.evictions,
        ]
    }
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Metrics collector shared by the explorer client and the data manager.
///
/// Cloning is cheap; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an HTTP request with duration.
    pub fn record_http_request(&self, duration: Duration) {
        bump(&self.counters.http_requests, 1);
        bump(&self.counters.http_duration_ms, duration.as_millis() as u64);
    }

    pub fn record_http_error(&self) {
        bump(&self.counters.http_errors, 1);
    }

    pub fn record_cache_hit(&self) {
        bump(&self.counters.cache_hits, 1);
    }

    pub fn record_cache_miss(&self) {
        bump(&self.counters.cache_misses, 1);
    }

    pub fn record_snapshot_fetched(&self) {
        bump(&self.counters.snapshots_fetched, 1);
    }

    pub fn record_sub_fetch_error(&self) {
        bump(&self.counters.sub_fetch_errors, 1);
    }

    pub fn record_evictions(&self, count: usize) {
        bump(&self.counters.evictions, count as u64);
    }

    pub fn http_requests_total(&self) -> u64 {
        read(&self.counters.http_requests)
    }

    pub fn http_errors_total(&self) -> u64 {
        read(&self.counters.http_errors)
    }

    pub fn http_duration_total_ms(&self) -> u64 {
        read(&self.counters.http_duration_ms)
    }

    /// Mean request duration in milliseconds, 0.0 before the first request.
    pub fn http_duration_avg_ms(&self) -> f64 {
        ratio(self.http_duration_total_ms(), self.http_requests_total())
    }

    pub fn cache_hits_total(&self) -> u64 {
        read(&self.counters.cache_hits)
    }

    pub fn cache_misses_total(&self) -> u64 {
        read(&self.counters.cache_misses)
    }

    /// Fraction of reads served from cache, 0.0 when nothing was read yet.
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits_total();
        ratio(hits, hits + self.cache_misses_total())
    }

    pub fn snapshots_fetched_total(&self) -> u64 {
        read(&self.counters.snapshots_fetched)
    }

    pub fn sub_fetch_errors_total(&self) -> u64 {
        read(&self.counters.sub_fetch_errors)
    }

    pub fn evictions_total(&self) -> u64 {
        read(&self.counters.evictions)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in self.counters.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of every counter.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            http_requests_total: self.http_requests_total(),
            http_errors_total: self.http_errors_total(),
            http_duration_avg_ms: self.http_duration_avg_ms(),
            cache_hits_total: self.cache_hits_total(),
            cache_misses_total: self.cache_misses_total(),
            cache_hit_rate: self.cache_hit_rate(),
            snapshots_fetched_total: self.snapshots_fetched_total(),
            sub_fetch_errors_total: self.sub_fetch_errors_total(),
            evictions_total: self.evictions_total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub http_duration_avg_ms: f64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub cache_hit_rate: f64,
    pub snapshots_fetched_total: u64,
    pub sub_fetch_errors_total: u64,
    pub evictions_total: u64,
}

/// Times one HTTP request; consumed by exactly one of the `complete*` calls.
pub struct HttpTimer {
    start: Instant,
    metrics: Metrics,
}

impl HttpTimer {
    pub fn start(metrics: &Metrics) -> Self {
        Self {
            start: Instant::now(),
            metrics: metrics.clone(),
        }
    }

    pub fn complete(self) {
        self.metrics.record_http_request(self.start.elapsed());
    }

    pub fn complete_with_error(self) {
        self.metrics.record_http_error();
        self.complete();
    }
}
