//! Domain validation errors.

use std::fmt;

/// Errors that can occur during domain value object validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided address is empty.
    EmptyAddress,

    /// The provided address contains characters outside the base58 alphabet
    /// or exceeds the maximum length.
    InvalidAddress(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAddress => write!(f, "Address cannot be empty"),
            Self::InvalidAddress(address) => write!(f, "Invalid address: {}", address),
        }
    }
}

impl std::error::Error for ValidationError {}
