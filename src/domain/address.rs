//! WalletAddress value object.

use super::errors::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Upper bound on address length; real addresses are well under this.
const MAX_ADDRESS_LEN: usize = 128;

/// Prefix shared by every cache key derived from an address.
const CACHE_KEY_PREFIX: &str = "wallet:";

static BASE58_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]+$").expect("base58 address pattern is valid")
});

/// A type-safe wrapper for on-chain account addresses.
///
/// Surrounding whitespace is trimmed; the remainder must be a non-empty
/// base58 string.
///
/// # Example
///
/// ```
/// use wallet_cache::domain::WalletAddress;
///
/// let address = WalletAddress::new(" 1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQH ").unwrap();
/// assert_eq!(address.as_str(), "1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQH");
/// assert_eq!(address.cache_key(), "wallet:1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQH");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Create a new WalletAddress, validating the format.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyAddress` for blank input and
    /// `ValidationError::InvalidAddress` for anything that is not base58.
    pub fn new(address: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = address.as_ref().trim();

        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }

        if trimmed.len() > MAX_ADDRESS_LEN || !BASE58_ADDRESS.is_match(trimmed) {
            return Err(ValidationError::InvalidAddress(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into the underlying String.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The cache key for this address. One key per address.
    pub fn cache_key(&self) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, self.0)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        WalletAddress::new(s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
