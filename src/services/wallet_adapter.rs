//! UI-facing views over the wallet data manager.
//!
//! The adapter holds no wallet data of its own; every read goes through
//! [`WalletDataManager`]. It only keeps a rolling window of observed load
//! times for diagnostics.

use crate::cache::Subscription;
use crate::domain::ValidationError;
use crate::metrics::LoadTimeWindow;
use crate::models::{PerformanceSnapshot, Token, TokenCategory, TokenSummary, WalletSnapshot, WalletSummary};
use crate::services::token_filter::{apply_filters, TokenFilters};
use crate::services::wallet_data::WalletDataManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct WalletAdapter {
    manager: Arc<WalletDataManager>,
    load_times: Mutex<LoadTimeWindow>,
}

impl WalletAdapter {
    pub fn new(manager: Arc<WalletDataManager>) -> Self {
        let window = manager.settings().metrics_window;
        Self {
            manager,
            load_times: Mutex::new(LoadTimeWindow::new(window)),
        }
    }

    pub fn manager(&self) -> &Arc<WalletDataManager> {
        &self.manager
    }

    fn record_load(&self, started: Instant) {
        self.load_times.lock().record(started.elapsed());
    }

    /// Headline numbers for one wallet. Never fails; problems are reported
    /// in the summary's `error`.
    pub async fn get_wallet_summary(&self, address: &str, force_refresh: bool) -> WalletSummary {
        let started = Instant::now();
        let summary = match self.manager.get(address, force_refresh).await {
            Ok(snapshot) => summarize(&snapshot),
            Err(e) => WalletSummary::failed(address, self.manager.now(), e.to_string()),
        };
        self.record_load(started);
        summary
    }

    /// Counts per category plus the most valuable fungible tokens.
    pub async fn get_token_summary(&self, address: &str) -> TokenSummary {
        let started = Instant::now();
        let summary = match self.manager.get(address, false).await {
            Ok(snapshot) => token_summary(&snapshot, self.manager.settings().top_tokens),
            Err(e) => TokenSummary {
                error: Some(e.to_string()),
                ..Default::default()
            },
        };
        self.record_load(started);
        summary
    }

    /// Tokens of one wallet after filtering and sorting. Empty when the
    /// wallet cannot be read.
    pub async fn get_filtered_tokens(&self, address: &str, filters: &TokenFilters) -> Vec<Token> {
        let started = Instant::now();
        let tokens = match self.manager.get(address, false).await {
            Ok(snapshot) => apply_filters(&snapshot, filters),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Cannot list tokens");
                Vec::new()
            }
        };
        self.record_load(started);
        tokens
    }

    /// Summaries for several wallets, keyed by the addresses as given.
    pub async fn get_batch_summaries<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> HashMap<String, WalletSummary> {
        let started = Instant::now();
        let summaries = self
            .manager
            .batch_get(addresses, false)
            .await
            .into_iter()
            .map(|(address, snapshot)| (address, summarize(&snapshot)))
            .collect();
        self.record_load(started);
        summaries
    }

    /// Warm the cache in chunks, pausing between chunks.
    pub async fn preload_wallets<S: AsRef<str>>(&self, addresses: &[S]) {
        let settings = self.manager.settings();
        let chunk_size = settings.batch_chunk_size.max(1);
        let delay = settings.inter_chunk_delay;

        for (index, chunk) in addresses.chunks(chunk_size).enumerate() {
            if index > 0 && delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = self.manager.preload(chunk).await {
                tracing::warn!(error = %e, "Preload chunk aborted");
            }
        }
    }

    pub fn performance_metrics(&self) -> PerformanceSnapshot {
        let (average_load_time_ms, samples) = {
            let window = self.load_times.lock();
            (window.average_ms(), window.len())
        };
        let stats = self.manager.cache_stats();

        PerformanceSnapshot {
            average_load_time_ms,
            samples,
            cache_entries: stats.entries,
            in_flight: stats.in_flight,
            subscribers: stats.subscribers,
            cache_hit_rate: self.manager.metrics().cache_hit_rate(),
        }
    }

    pub fn clear_cache(&self, address: Option<&str>) {
        self.manager.clear(address);
    }

    pub fn subscribe<F>(&self, address: &str, listener: F) -> Result<Subscription, ValidationError>
    where
        F: Fn(&Arc<WalletSnapshot>) + Send + Sync + 'static,
    {
        self.manager.subscribe(address, listener)
    }
}

fn total_value_usd(snapshot: &WalletSnapshot) -> f64 {
    snapshot
        .tokens
        .iter()
        .chain(snapshot.nfts.iter())
        .map(|t| t.usd_value)
        .sum()
}

/// Reduce a snapshot to its headline numbers.
pub fn summarize(snapshot: &WalletSnapshot) -> WalletSummary {
    WalletSummary {
        address: snapshot.address.clone(),
        total_value_usd: total_value_usd(snapshot),
        native_balance: snapshot.balance.total(),
        locked_balance: snapshot.balance.locked,
        utxo_count: snapshot.balance.utxo_count,
        token_count: snapshot.tokens.len(),
        nft_count: snapshot.nfts.len(),
        transaction_count: snapshot.transactions.len(),
        last_activity: snapshot.last_activity(),
        fetched_at: snapshot.fetched_at,
        is_loading: snapshot.is_loading,
        error: snapshot.error.clone(),
    }
}

/// Categorize every holding and pick the `top_n` most valuable fungible tokens.
pub fn token_summary(snapshot: &WalletSnapshot, top_n: usize) -> TokenSummary {
    let mut summary = TokenSummary {
        error: snapshot.error.clone(),
        ..Default::default()
    };

    for token in snapshot.tokens.iter().chain(snapshot.nfts.iter()) {
        summary.total += 1;
        summary.total_value_usd += token.usd_value;
        match token.category() {
            TokenCategory::Verified => summary.verified += 1,
            TokenCategory::Lp => summary.lp += 1,
            TokenCategory::Nft => summary.nft += 1,
            TokenCategory::Regular => summary.regular += 1,
        }
    }

    let mut fungible: Vec<Token> = snapshot.tokens.iter().filter(|t| !t.is_nft).cloned().collect();
    fungible.sort_by(|a, b| b.usd_value.total_cmp(&a.usd_value));
    fungible.truncate(top_n);
    summary.top_tokens = fungible;

    summary
}
