//! Configuration management for the wallet cache.
//!
//! This module handles loading and validating configuration from environment
//! variables. A `.env` file is loaded if present.

use crate::error::{ConfigError, ConfigResult};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the cache, the manager's maintenance task and the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Lifetime of a wallet snapshot
    pub ttl: Duration,

    /// Maximum number of cached wallets
    pub max_entries: usize,

    /// Addresses per preload chunk
    pub batch_chunk_size: usize,

    /// Pause between preload chunks
    pub inter_chunk_delay: Duration,

    /// Period of the expiry sweep
    pub sweep_interval: Duration,

    /// Number of load-time samples kept for the rolling average
    pub metrics_window: usize,

    /// Transactions fetched per snapshot
    pub transaction_limit: usize,

    /// Tokens listed in a token summary
    pub top_tokens: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(30_000),
            max_entries: 50,
            batch_chunk_size: 5,
            inter_chunk_delay: Duration::from_millis(100),
            sweep_interval: Duration::from_secs(60),
            metrics_window: 100,
            transaction_limit: 20,
            top_tokens: 5,
        }
    }
}

/// Configuration for the wallet cache.
#[derive(Debug, Clone)]
pub struct Config {
    /// Explorer API base URL
    pub explorer_api_url: String,

    /// Optional explorer API key
    pub explorer_api_key: Option<String>,

    /// HTTP request timeout in seconds (default: 10)
    pub request_timeout: u64,

    /// Snapshot TTL in milliseconds (default: 30000)
    pub cache_ttl_ms: u64,

    /// Maximum cached wallets (default: 50)
    pub max_entries: usize,

    /// Preload chunk size (default: 5)
    pub batch_chunk_size: usize,

    /// Delay between preload chunks in milliseconds (default: 100)
    pub batch_delay_ms: u64,

    /// Expiry sweep interval in seconds (default: 60)
    pub sweep_interval_secs: u64,

    /// Rolling load-time window (default: 100)
    pub metrics_window: usize,

    /// Transactions per snapshot (default: 20)
    pub transaction_limit: usize,

    /// Tokens in a token summary (default: 5)
    pub top_tokens: usize,

    /// Directory for the on-disk cache mirror; none keeps the cache in memory
    pub cache_dir: Option<PathBuf>,

    /// Log level (default: "warn")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `EXPLORER_API_URL`: Base URL for the explorer API
    ///
    /// Optional environment variables:
    /// - `EXPLORER_API_KEY`: API key sent as `x-api-key`
    /// - `REQUEST_TIMEOUT`: HTTP timeout in seconds (default: 10)
    /// - `WALLET_CACHE_TTL_MS`: Snapshot TTL (default: 30000)
    /// - `WALLET_CACHE_MAX_ENTRIES`: Cache capacity (default: 50)
    /// - `WALLET_BATCH_CHUNK_SIZE`: Preload chunk size (default: 5)
    /// - `WALLET_BATCH_DELAY_MS`: Delay between chunks (default: 100)
    /// - `WALLET_SWEEP_INTERVAL_SECS`: Sweep period (default: 60)
    /// - `WALLET_METRICS_WINDOW`: Load-time samples kept (default: 100)
    /// - `WALLET_TRANSACTION_LIMIT`: Transactions per snapshot (default: 20)
    /// - `WALLET_TOP_TOKENS`: Tokens per token summary (default: 5)
    /// - `WALLET_CACHE_DIR`: Directory for the durable cache mirror
    /// - `LOG_LEVEL`: Logging level (default: "warn")
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let explorer_api_url = env::var("EXPLORER_API_URL")
            .map_err(|_| ConfigError::MissingVar("EXPLORER_API_URL".to_string()))?;

        if !explorer_api_url.starts_with("http://") && !explorer_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "EXPLORER_API_URL".to_string(),
                reason: "Must start with http:// or https://".to_string(),
            });
        }

        let explorer_api_key = env::var("EXPLORER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let defaults = Config::default();

        let request_timeout = Self::parse_env_u64("REQUEST_TIMEOUT", defaults.request_timeout)?;
        let cache_ttl_ms = Self::parse_env_u64("WALLET_CACHE_TTL_MS", defaults.cache_ttl_ms)?;
        let max_entries =
            Self::parse_env_nonzero_usize("WALLET_CACHE_MAX_ENTRIES", defaults.max_entries)?;
        let batch_chunk_size =
            Self::parse_env_nonzero_usize("WALLET_BATCH_CHUNK_SIZE", defaults.batch_chunk_size)?;
        let batch_delay_ms = Self::parse_env_u64("WALLET_BATCH_DELAY_MS", defaults.batch_delay_ms)?;
        let sweep_interval_secs =
            Self::parse_env_u64("WALLET_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?;
        let metrics_window =
            Self::parse_env_nonzero_usize("WALLET_METRICS_WINDOW", defaults.metrics_window)?;
        let transaction_limit =
            Self::parse_env_usize("WALLET_TRANSACTION_LIMIT", defaults.transaction_limit)?;
        let top_tokens = Self::parse_env_usize("WALLET_TOP_TOKENS", defaults.top_tokens)?;

        if sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "WALLET_SWEEP_INTERVAL_SECS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        let cache_dir = env::var("WALLET_CACHE_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| defaults.log_level.clone());

        Ok(Config {
            explorer_api_url,
            explorer_api_key,
            request_timeout,
            cache_ttl_ms,
            max_entries,
            batch_chunk_size,
            batch_delay_ms,
            sweep_interval_secs,
            metrics_window,
            transaction_limit,
            top_tokens,
            cache_dir,
            log_level,
        })
    }

    /// The cache-related subset of this configuration.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_millis(self.cache_ttl_ms),
            max_entries: self.max_entries,
            batch_chunk_size: self.batch_chunk_size,
            inter_chunk_delay: Duration::from_millis(self.batch_delay_ms),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            metrics_window: self.metrics_window,
            transaction_limit: self.transaction_limit,
            top_tokens: self.top_tokens,
        }
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as usize with a default value.
    fn parse_env_usize(var_name: &str, default: usize) -> ConfigResult<usize> {
        match env::var(var_name) {
            Ok(val) => val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as a usize that must be at least 1.
    fn parse_env_nonzero_usize(var_name: &str, default: usize) -> ConfigResult<usize> {
        let value = Self::parse_env_usize(var_name, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }
        Ok(value)
    }
}

impl Default for Config {
    fn default() -> Self {
        let settings = CacheSettings::default();
        Config {
            explorer_api_url: String::new(),
            explorer_api_key: None,
            request_timeout: 10,
            cache_ttl_ms: settings.ttl.as_millis() as u64,
            max_entries: settings.max_entries,
            batch_chunk_size: settings.batch_chunk_size,
            batch_delay_ms: settings.inter_chunk_delay.as_millis() as u64,
            sweep_interval_secs: settings.sweep_interval.as_secs(),
            metrics_window: settings.metrics_window,
            transaction_limit: settings.transaction_limit,
            top_tokens: settings.top_tokens,
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}
