//! Immutable per-address wallet snapshot.

use super::{Balance, Token, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything known about one address at one point in time.
///
/// Snapshots are shared as `Arc<WalletSnapshot>` and never mutated after
/// construction; a refresh replaces the cached snapshot wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: String,
    pub balance: Balance,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub nfts: Vec<Token>,
    /// Newest transactions only, bounded by the configured limit
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub is_loading: bool,
    /// First sub-fetch failure, if any part of the snapshot is missing
    #[serde(default)]
    pub error: Option<String>,
}

impl WalletSnapshot {
    /// Assemble a snapshot from its parts.
    pub fn new(
        address: impl Into<String>,
        balance: Balance,
        tokens: Vec<Token>,
        nfts: Vec<Token>,
        transactions: Vec<Transaction>,
        fetched_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        Self {
            address: address.into(),
            balance,
            tokens,
            nfts,
            transactions,
            fetched_at,
            is_loading: false,
            error,
        }
    }

    /// An empty snapshot carrying only an error, used when an address could
    /// not be fetched at all.
    pub fn failed(
        address: impl Into<String>,
        fetched_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            address,
            Balance::default(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            fetched_at,
            Some(error.into()),
        )
    }

    /// Latest transaction time, falling back to the fetch time.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.transactions
            .iter()
            .map(|tx| tx.timestamp)
            .max()
            .unwrap_or(self.fetched_at)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}
