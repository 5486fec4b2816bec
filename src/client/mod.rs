//! HTTP client for the blockchain explorer API.
//!
//! This module provides a synchronous HTTP client that can be used from async contexts
//! via `tokio::task::spawn_blocking`. The client handles the optional API key, error
//! mapping, and validation of explorer payloads into domain models.

mod async_wrapper;
mod wire;

pub use async_wrapper::{AsyncExplorerClient, WalletApi};
pub use wire::{scale_amount, NATIVE_DECIMALS};

use crate::config::Config;
use crate::error::{ExplorerApiError, ExplorerApiResult};
use crate::metrics::{HttpTimer, Metrics};
use crate::models::{Balance, Token, Transaction};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use wire::{validate_all, RawBalance, RawToken, RawTransaction};

/// HTTP client for the explorer API.
///
/// This client uses `ureq` for synchronous HTTP requests and can be called
/// from async contexts using `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct ExplorerClient {
    /// Base URL for the explorer API
    base_url: String,

    /// Optional API key, sent as `x-api-key`
    api_key: Option<String>,

    /// HTTP client agent
    agent: Arc<ureq::Agent>,

    /// Metrics collector
    metrics: Metrics,
}

impl ExplorerClient {
    /// Create a new ExplorerClient from configuration.
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout))
            .build();

        Self {
            base_url: config.explorer_api_url.clone(),
            api_key: config.explorer_api_key.clone(),
            agent: Arc::new(agent),
            metrics: Metrics::new(),
        }
    }

    /// Create an ExplorerClient with a custom base URL (useful for testing).
    #[doc(hidden)]
    pub fn with_base_url(base_url: String, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();

        Self {
            base_url,
            api_key,
            agent: Arc::new(agent),
            metrics: Metrics::new(),
        }
    }

    /// Share a metrics collector with the rest of the stack.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get a reference to the metrics collector.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Build a full URL from a path.
    fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Path prefix for one address, with the address percent-encoded.
    fn address_path(address: &str, resource: &str) -> String {
        format!("/addresses/{}/{}", urlencoding::encode(address), resource)
    }

    /// Execute a GET request.
    fn get(&self, path: &str) -> Result<ureq::Response, ExplorerApiError> {
        let timer = HttpTimer::start(&self.metrics);
        let url = self.build_url(path);

        tracing::debug!("GET {}", url);

        let mut request = self.agent.get(&url).set("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("x-api-key", key);
        }

        match request.call() {
            Ok(response) => {
                timer.complete();
                Ok(response)
            }
            Err(e) => {
                timer.complete_with_error();
                let error = self.map_error(e);
                tracing::warn!("GET {} - Error: {}", url, error);
                Err(error)
            }
        }
    }

    /// GET a path and decode its JSON body.
    fn get_json<T: DeserializeOwned>(&self, path: &str) -> ExplorerApiResult<T> {
        let response = self.get(path)?;
        let body = response
            .into_string()
            .map_err(|e| ExplorerApiError::HttpError(e.to_string()))?;
        serde_json::from_str(&body).map_err(ExplorerApiError::JsonError)
    }

    /// Map a ureq error to an ExplorerApiError.
    fn map_error(&self, error: ureq::Error) -> ExplorerApiError {
        match error {
            ureq::Error::Status(code, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "Unknown error".to_string());

                match code {
                    401 => ExplorerApiError::Unauthorized,
                    404 => ExplorerApiError::NotFound(message),
                    429 => ExplorerApiError::RateLimitExceeded,
                    _ => ExplorerApiError::ApiError {
                        status: code,
                        message,
                    },
                }
            }
            ureq::Error::Transport(transport) => {
                if transport.kind() == ureq::ErrorKind::ConnectionFailed {
                    ExplorerApiError::HttpError("Connection failed".to_string())
                } else if transport.kind() == ureq::ErrorKind::Io {
                    ExplorerApiError::Timeout
                } else {
                    ExplorerApiError::HttpError(transport.to_string())
                }
            }
        }
    }

    /// Native balance of an address.
    pub fn get_balance(&self, address: &str) -> ExplorerApiResult<Balance> {
        let raw: RawBalance = self.get_json(&Self::address_path(address, "balance"))?;
        Balance::try_from(raw)
    }

    /// Fungible tokens held by an address.
    pub fn get_tokens(&self, address: &str) -> ExplorerApiResult<Vec<Token>> {
        let raw: Vec<RawToken> = self.get_json(&Self::address_path(address, "tokens"))?;
        Ok(validate_all(raw, "token", |t| t.into_token(false)))
    }

    /// NFTs held by an address.
    pub fn get_nfts(&self, address: &str) -> ExplorerApiResult<Vec<Token>> {
        let raw: Vec<RawToken> = self.get_json(&Self::address_path(address, "nfts"))?;
        Ok(validate_all(raw, "nft", |t| t.into_token(true)))
    }

    /// The newest `limit` transactions of an address, newest first.
    pub fn get_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> ExplorerApiResult<Vec<Transaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let path = format!(
            "{}?page=1&limit={}",
            Self::address_path(address, "transactions"),
            limit
        );
        let raw: Vec<RawTransaction> = self.get_json(&path)?;

        let mut transactions = validate_all(raw, "transaction", Transaction::try_from);
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions.truncate(limit);
        Ok(transactions)
    }
}
