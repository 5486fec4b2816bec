use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wallet_cache::error::{ExplorerApiError, ExplorerApiResult};
use wallet_cache::models::{Balance, Token, Transaction, TransactionDirection, TransactionStatus};
use wallet_cache::WalletApi;

/// Everything the mock serves for one address.
#[derive(Debug, Clone, Default)]
pub struct WalletFixture {
    pub balance: Balance,
    pub tokens: Vec<Token>,
    pub nfts: Vec<Token>,
    pub transactions: Vec<Transaction>,
}

/// A fungible token with the given symbol and USD value.
#[allow(dead_code)]
pub fn token(symbol: &str, usd_value: f64) -> Token {
    Token {
        id: format!("id-{}", symbol.to_lowercase()),
        symbol: symbol.to_string(),
        name: format!("{} Token", symbol),
        decimals: 18,
        amount: 1.0,
        usd_value,
        ..Default::default()
    }
}

/// A small wallet with two tokens, one NFT and two transactions.
#[allow(dead_code)]
pub fn sample_wallet() -> WalletFixture {
    let mut nft = token("PUNK", 0.0);
    nft.is_nft = true;
    nft.decimals = 0;

    let tx = |hash: &str, secs: i64| Transaction {
        hash: hash.to_string(),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        amount: 1.5,
        fee: 0.001,
        direction: TransactionDirection::Incoming,
        status: TransactionStatus::Confirmed,
    };

    WalletFixture {
        balance: Balance {
            available: 10.0,
            locked: 2.0,
            utxo_count: 4,
        },
        tokens: vec![token("ALPH", 10.0), token("USDT", 50.0)],
        nfts: vec![nft],
        transactions: vec![tx("tx-new", 2_000), tx("tx-old", 1_000)],
    }
}

/// Mock explorer API for testing.
///
/// Serves configured fixtures per address, can be told to fail individual
/// methods, and tracks method calls for verification. Unknown addresses
/// fail every method with `NotFound`.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct MockWalletApi {
    wallets: Arc<Mutex<HashMap<String, WalletFixture>>>,
    failures: Arc<Mutex<HashSet<(String, String)>>>,
    call_counts: Arc<Mutex<HashMap<String, usize>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

#[allow(dead_code)]
impl MockWalletApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `fixture` for `address`.
    pub fn add_wallet(&self, address: &str, fixture: WalletFixture) {
        let mut wallets = self.wallets.lock().unwrap();
        wallets.insert(address.to_string(), fixture);
    }

    /// Make `method` (e.g. "fetch_tokens") time out for `address`.
    pub fn fail(&self, address: &str, method: &str) {
        let mut failures = self.failures.lock().unwrap();
        failures.insert((address.to_string(), method.to_string()));
    }

    /// Stop failing everything for `address`.
    pub fn recover(&self, address: &str) {
        let mut failures = self.failures.lock().unwrap();
        failures.retain(|(a, _)| a != address);
    }

    /// Sleep this long inside every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Total calls of `method` across all addresses.
    pub fn get_call_count(&self, method: &str) -> usize {
        let counts = self.call_counts.lock().unwrap();
        *counts.get(method).unwrap_or(&0)
    }

    /// Calls of `method` for one address.
    pub fn get_call_count_for(&self, method: &str, address: &str) -> usize {
        let counts = self.call_counts.lock().unwrap();
        *counts.get(&format!("{}:{}", method, address)).unwrap_or(&0)
    }

    /// Calls of all four methods for one address.
    pub fn total_calls_for(&self, address: &str) -> usize {
        ["fetch_balance", "fetch_tokens", "fetch_nfts", "fetch_transactions"]
            .iter()
            .map(|m| self.get_call_count_for(m, address))
            .sum()
    }

    /// Reset all call counts.
    pub fn reset_call_counts(&self) {
        let mut counts = self.call_counts.lock().unwrap();
        counts.clear();
    }

    fn track_call(&self, method: &str, address: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method.to_string()).or_insert(0) += 1;
        *counts.entry(format!("{}:{}", method, address)).or_insert(0) += 1;
    }

    async fn serve<T>(
        &self,
        method: &str,
        address: &str,
        select: impl FnOnce(&WalletFixture) -> T,
    ) -> ExplorerApiResult<T> {
        self.track_call(method, address);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures
            .lock()
            .unwrap()
            .contains(&(address.to_string(), method.to_string()));
        if failing {
            return Err(ExplorerApiError::Timeout);
        }

        let wallets = self.wallets.lock().unwrap();
        wallets
            .get(address)
            .map(select)
            .ok_or_else(|| ExplorerApiError::NotFound(format!("Address {} not found", address)))
    }
}

#[async_trait]
impl WalletApi for MockWalletApi {
    async fn fetch_balance(&self, address: &str) -> ExplorerApiResult<Balance> {
        self.serve("fetch_balance", address, |w| w.balance)
            .await
    }

    async fn fetch_tokens(&self, address: &str) -> ExplorerApiResult<Vec<Token>> {
        self.serve("fetch_tokens", address, |w| w.tokens.clone())
            .await
    }

    async fn fetch_nfts(&self, address: &str) -> ExplorerApiResult<Vec<Token>> {
        self.serve("fetch_nfts", address, |w| w.nfts.clone()).await
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> ExplorerApiResult<Vec<Transaction>> {
        self.serve("fetch_transactions", address, |w| {
            w.transactions.iter().take(limit).cloned().collect()
        })
        .await
    }
}
