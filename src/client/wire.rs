//! Raw explorer payloads and their validation into domain models.
//!
//! On-chain amounts arrive as integer strings in the smallest unit (or
//! occasionally as JSON numbers) and are converted to whole units here.
//! Individual malformed records are skipped with a warning; a payload that
//! is not JSON of the expected shape fails the whole request.

use crate::error::{ExplorerApiError, ExplorerApiResult};
use crate::models::{Balance, Token, Transaction, TransactionDirection, TransactionStatus};
use chrono::DateTime;
use serde::{Deserialize, Deserializer};

/// Decimals of the native coin.
pub const NATIVE_DECIMALS: u8 = 18;

/// Accept either `"123"` or `123` and keep the textual form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

/// Convert an integer amount in the smallest unit into whole units.
///
/// Decimal strings are accepted as already being in whole units.
pub fn scale_amount(raw: &str, decimals: u8) -> ExplorerApiResult<f64> {
    let raw = raw.trim();
    if raw.contains('.') || raw.contains('e') || raw.contains('E') {
        return raw
            .parse::<f64>()
            .map_err(|_| ExplorerApiError::InvalidResponse(format!("invalid amount: {}", raw)));
    }
    let value = raw
        .parse::<i128>()
        .map_err(|_| ExplorerApiError::InvalidResponse(format!("invalid amount: {}", raw)))?;
    Ok(value as f64 / 10f64.powi(i32::from(decimals)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBalance {
    #[serde(deserialize_with = "string_or_number")]
    balance: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    locked_balance: Option<String>,
    #[serde(default)]
    utxo_num: u32,
}

impl TryFrom<RawBalance> for Balance {
    type Error = ExplorerApiError;

    fn try_from(raw: RawBalance) -> ExplorerApiResult<Self> {
        let total = scale_amount(&raw.balance, NATIVE_DECIMALS)?;
        let locked = match raw.locked_balance {
            Some(locked) => scale_amount(&locked, NATIVE_DECIMALS)?,
            None => 0.0,
        };
        if total < 0.0 || locked < 0.0 {
            return Err(ExplorerApiError::InvalidResponse(
                "negative balance".to_string(),
            ));
        }
        // The explorer reports total balance including the locked part
        Ok(Balance {
            available: (total - locked).max(0.0),
            locked,
            utxo_count: raw.utxo_num,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawToken {
    #[serde(default)]
    id: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    amount: Option<String>,
    #[serde(default)]
    usd_value: Option<f64>,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    is_lp: bool,
    #[serde(default)]
    logo_uri: Option<String>,
}

impl RawToken {
    pub(crate) fn into_token(self, is_nft: bool) -> ExplorerApiResult<Token> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(ExplorerApiError::InvalidResponse(
                "token without id".to_string(),
            ));
        }

        let decimals = self.decimals.unwrap_or(0);
        let amount = match self.amount {
            Some(raw) => scale_amount(&raw, decimals)?,
            None if is_nft => 1.0,
            None => 0.0,
        };
        let usd_value = self.usd_value.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0);
        let symbol = self.symbol.unwrap_or_default();
        let name = self.name.unwrap_or_else(|| symbol.clone());

        Ok(Token {
            id,
            symbol,
            name,
            decimals,
            amount,
            usd_value,
            verified: self.verified,
            is_lp: self.is_lp,
            is_nft,
            logo_uri: self.logo_uri.filter(|uri| !uri.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransaction {
    #[serde(default)]
    hash: String,
    /// Milliseconds since the epoch
    timestamp: i64,
    #[serde(deserialize_with = "string_or_number")]
    amount: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    fee: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = ExplorerApiError;

    fn try_from(raw: RawTransaction) -> ExplorerApiResult<Self> {
        if raw.hash.trim().is_empty() {
            return Err(ExplorerApiError::InvalidResponse(
                "transaction without hash".to_string(),
            ));
        }
        let timestamp = DateTime::from_timestamp_millis(raw.timestamp).ok_or_else(|| {
            ExplorerApiError::InvalidResponse(format!("invalid timestamp: {}", raw.timestamp))
        })?;

        let signed_amount = scale_amount(&raw.amount, NATIVE_DECIMALS)?;
        let fee = match raw.fee {
            Some(fee) => scale_amount(&fee, NATIVE_DECIMALS)?.abs(),
            None => 0.0,
        };

        let direction = match raw.direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("in") | Some("incoming") => TransactionDirection::Incoming,
            Some("out") | Some("outgoing") => TransactionDirection::Outgoing,
            Some("self") => TransactionDirection::SelfTransfer,
            _ if signed_amount < 0.0 => TransactionDirection::Outgoing,
            _ => TransactionDirection::Incoming,
        };

        let status = match raw.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("pending") | Some("mempool") => TransactionStatus::Pending,
            Some("failed") => TransactionStatus::Failed,
            _ => TransactionStatus::Confirmed,
        };

        Ok(Transaction {
            hash: raw.hash,
            timestamp,
            amount: signed_amount.abs(),
            fee,
            direction,
            status,
        })
    }
}

/// Convert every record, skipping the ones that fail validation.
pub(crate) fn validate_all<R, T>(
    raw: Vec<R>,
    kind: &str,
    convert: impl Fn(R) -> ExplorerApiResult<T>,
) -> Vec<T> {
    raw.into_iter()
        .filter_map(|record| match convert(record) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Skipping invalid record");
                None
            }
        })
        .collect()
}
