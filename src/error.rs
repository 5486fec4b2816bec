//! Error types for the wallet cache.
//!
//! This module defines custom error types using `thiserror` for precise error handling.

use thiserror::Error;

/// Errors that can occur when talking to the blockchain explorer API.
///
/// These are transport-level failures. The cache never surfaces them to
/// callers of `get`; a failed sub-fetch is folded into the snapshot's
/// `error` field instead.
#[derive(Error, Debug)]
pub enum ExplorerApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Response parsed but failed boundary validation
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Network timeout
    #[error("Request timeout")]
    Timeout,

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication failed
    #[error("Authentication failed")]
    Unauthorized,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Errors raised by a durable store or while (de)serializing persisted entries.
///
/// Persistence is best-effort: these are logged and swallowed by the
/// persistence adapter, never propagated into cache operations.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying storage I/O failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted payload was readable but not usable
    #[error("Corrupt persisted data: {0}")]
    Corrupt(String),
}

/// A broken invariant inside the fetch coordinator.
///
/// This is a programming fault rather than a runtime condition; tests assert
/// that it never occurs under normal operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// The producer task ended without yielding a result (panic or runtime shutdown)
    #[error("Fetch for {key} ended without a result: {reason}")]
    ProducerAborted { key: String, reason: String },
}

/// Error shared by every waiter of a coordinated fetch.
///
/// Must be `Clone` because one failure is delivered to all joined callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The requested address failed validation
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Every sub-fetch failed; carries the first failure in field order
    #[error("{0}")]
    Failed(String),

    /// The coordinator itself misbehaved
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

/// Convenience type alias for Results with ExplorerApiError
pub type ExplorerApiResult<T> = Result<T, ExplorerApiError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Convenience type alias for Results with FetchError
pub type FetchResult<T> = Result<T, FetchError>;
