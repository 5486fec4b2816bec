//! Account transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of value flow relative to the wallet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    #[default]
    Incoming,
    Outgoing,
    #[serde(rename = "self")]
    SelfTransfer,
}

/// Confirmation state of a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Confirmed,
    Pending,
    Failed,
}

/// A transaction touching the wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    /// Net amount moved, in whole native units
    pub amount: f64,
    #[serde(default)]
    pub fee: f64,
    #[serde(default)]
    pub direction: TransactionDirection,
    #[serde(default)]
    pub status: TransactionStatus,
}
