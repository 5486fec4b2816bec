//! Native-coin balance of an account.

use serde::{Deserialize, Serialize};

/// Native balance for one address, in whole units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Spendable amount
    pub available: f64,

    /// Amount locked (time-locked outputs, staking, etc.)
    pub locked: f64,

    /// Number of unspent outputs backing the balance
    pub utxo_count: u32,
}

impl Balance {
    /// Available plus locked.
    pub fn total(&self) -> f64 {
        self.available + self.locked
    }
}
