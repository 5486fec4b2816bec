//! Async wrapper around the synchronous ExplorerClient.
//!
//! This module provides the async data-source seam used by the wallet data
//! manager. The production implementation runs the blocking HTTP calls on
//! `tokio::task::spawn_blocking`; tests substitute their own implementation.

use crate::client::ExplorerClient;
use crate::error::{ExplorerApiError, ExplorerApiResult};
use crate::models::{Balance, Token, Transaction};
use async_trait::async_trait;
use std::sync::Arc;

/// Source of the four independent per-address datasets.
///
/// Each call either yields validated models or an error; the manager folds
/// errors into the snapshot rather than failing the whole read.
#[async_trait]
pub trait WalletApi: Send + Sync {
    async fn fetch_balance(&self, address: &str) -> ExplorerApiResult<Balance>;
    async fn fetch_tokens(&self, address: &str) -> ExplorerApiResult<Vec<Token>>;
    async fn fetch_nfts(&self, address: &str) -> ExplorerApiResult<Vec<Token>>;
    async fn fetch_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> ExplorerApiResult<Vec<Transaction>>;
}

/// Async wrapper around the synchronous ExplorerClient.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous HTTP
/// operations on a dedicated thread pool, preventing blocking
/// the async runtime.
#[derive(Clone)]
pub struct AsyncExplorerClient {
    client: Arc<ExplorerClient>,
}

impl AsyncExplorerClient {
    pub fn new(client: ExplorerClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Run a blocking client call off the async runtime.
    async fn run_blocking<T, F>(&self, call: F) -> ExplorerApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ExplorerClient) -> ExplorerApiResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || call(&client))
            .await
            .map_err(|e| ExplorerApiError::HttpError(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl WalletApi for AsyncExplorerClient {
    async fn fetch_balance(&self, address: &str) -> ExplorerApiResult<Balance> {
        let address = address.to_string();
        self.run_blocking(move |client| client.get_balance(&address))
            .await
    }

    async fn fetch_tokens(&self, address: &str) -> ExplorerApiResult<Vec<Token>> {
        let address = address.to_string();
        self.run_blocking(move |client| client.get_tokens(&address))
            .await
    }

    async fn fetch_nfts(&self, address: &str) -> ExplorerApiResult<Vec<Token>> {
        let address = address.to_string();
        self.run_blocking(move |client| client.get_nfts(&address)).await
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> ExplorerApiResult<Vec<Transaction>> {
        let address = address.to_string();
        self.run_blocking(move |client| client.get_transactions(&address, limit))
            .await
    }
}
