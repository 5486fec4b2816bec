//! Fungible tokens and NFTs held by an account.

use serde::{Deserialize, Serialize};

/// Helper function to check if a boolean is false (for serde skip_serializing_if)
fn is_false(b: &bool) -> bool {
    !*b
}

/// Classification bucket used by token summaries and category filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    Verified,
    Lp,
    Nft,
    Regular,
}

/// A token balance held by a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Token {
    /// Token identifier (contract id)
    pub id: String,

    /// Ticker symbol
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Number of decimals of the on-chain amount
    pub decimals: u8,

    /// Amount held, in whole units
    pub amount: f64,

    /// Value of the held amount in USD, zero when no price is known
    pub usd_value: f64,

    /// Listed in a verified token registry
    #[serde(skip_serializing_if = "is_false")]
    pub verified: bool,

    /// Liquidity-pool share token
    #[serde(skip_serializing_if = "is_false")]
    pub is_lp: bool,

    /// Non-fungible token
    #[serde(skip_serializing_if = "is_false")]
    pub is_nft: bool,

    /// Logo URL if the registry provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl Token {
    /// The single category this token falls into.
    ///
    /// Flags are checked in the order NFT, LP, verified; a token with none
    /// of them is regular.
    pub fn category(&self) -> TokenCategory {
        if self.is_nft {
            TokenCategory::Nft
        } else if self.is_lp {
            TokenCategory::Lp
        } else if self.verified {
            TokenCategory::Verified
        } else {
            TokenCategory::Regular
        }
    }

    /// Whether the held amount is strictly positive.
    pub fn has_balance(&self) -> bool {
        self.amount > 0.0
    }
}
