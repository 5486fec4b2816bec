//! Wallet Cache - a caching and fetch-coordination layer for on-chain wallet data.
//!
//! Serves balances, tokens, NFTs and transactions for many concurrent callers
//! while keeping network traffic down: snapshots are cached with a TTL,
//! concurrent reads of the same address share one fetch, updates fan out to
//! subscribers, and the cache can be warmed from durable storage on startup.
//!
//! # Architecture
//!
//! - **models**: Wallet snapshots and the summaries derived from them
//! - **domain**: Validated wallet addresses
//! - **error**: Custom error types for precise error handling
//! - **config**: Configuration management from environment variables
//! - **clock**: Wall-clock abstraction for TTL expiry
//! - **client**: HTTP client for the explorer API and the async data-source trait
//! - **cache**: Snapshot store, fetch coordinator, subscriptions and persistence
//! - **services**: The wallet data manager and the UI-facing adapter
//! - **metrics**: Counters and load-time tracking

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use cache::{
    CacheStore, DurableStore, FetchCoordinator, FileStore, MemoryStore, PersistenceAdapter,
    Subscription, SubscriptionHub,
};
pub use client::{AsyncExplorerClient, ExplorerClient, WalletApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheSettings, Config};
pub use domain::{ValidationError, WalletAddress};
pub use error::{
    ConfigError, CoordinationError, ExplorerApiError, FetchError, PersistenceError,
};
pub use metrics::{HttpTimer, LoadTimeWindow, Metrics, MetricsSummary};
pub use models::{
    Balance, PerformanceSnapshot, Token, TokenCategory, TokenSummary, Transaction,
    TransactionDirection, TransactionStatus, WalletSnapshot, WalletSummary,
};
pub use services::{
    CacheStats, SortBy, SortOrder, TokenCategoryFilter, TokenFilters, WalletAdapter,
    WalletDataManager,
};
