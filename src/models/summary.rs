//! UI-facing views derived from wallet snapshots.

use super::Token;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Headline numbers for one wallet.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub address: String,
    /// Sum of USD values over tokens and NFTs
    pub total_value_usd: f64,
    /// Available plus locked native balance
    pub native_balance: f64,
    pub locked_balance: f64,
    pub utxo_count: u32,
    pub token_count: usize,
    pub nft_count: usize,
    pub transaction_count: usize,
    pub last_activity: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletSummary {
    /// A zeroed summary carrying only an error.
    pub fn failed(address: impl Into<String>, now: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            total_value_usd: 0.0,
            native_balance: 0.0,
            locked_balance: 0.0,
            utxo_count: 0,
            token_count: 0,
            nft_count: 0,
            transaction_count: 0,
            last_activity: now,
            fetched_at: now,
            is_loading: false,
            error: Some(error.into()),
        }
    }
}

/// Categorized breakdown of a wallet's holdings.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub total: usize,
    pub verified: usize,
    pub lp: usize,
    pub nft: usize,
    pub regular: usize,
    pub total_value_usd: f64,
    /// Highest-value fungible tokens, descending
    pub top_tokens: Vec<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load counters plus cache occupancy, for diagnostics only.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub average_load_time_ms: f64,
    pub samples: usize,
    pub cache_entries: usize,
    pub in_flight: usize,
    pub subscribers: usize,
    pub cache_hit_rate: f64,
}
