//! Wallet Cache - command line entry point
//!
//! Prints a JSON summary for every address given on the command line. The
//! cache is mirrored to `WALLET_CACHE_DIR` when set, so repeated runs within
//! the TTL are served without network calls.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use wallet_cache::{
    AsyncExplorerClient, Config, ExplorerClient, FileStore, PersistenceAdapter, WalletAdapter,
    WalletApi, WalletDataManager,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Reads .env once; the log level comes from the same load
    let loaded = Config::from_env();

    // Initialize logging (stderr only so stdout stays machine-readable)
    let fallback = loaded
        .as_ref()
        .map(|cfg| cfg.log_level.clone())
        .unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let addresses: Vec<String> = std::env::args().skip(1).collect();
    if addresses.is_empty() {
        bail!("usage: wallet-cache <address> [<address> ...]");
    }

    let config = match loaded {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Using explorer API at {}", config.explorer_api_url);

    let sync_client = ExplorerClient::new(&config);
    let metrics = sync_client.metrics().clone();
    let api = Arc::new(AsyncExplorerClient::new(sync_client)) as Arc<dyn WalletApi>;

    let mut builder = WalletDataManager::builder(api)
        .settings(config.cache_settings())
        .metrics(metrics);

    if let Some(dir) = &config.cache_dir {
        match FileStore::new(dir) {
            Ok(store) => {
                builder = builder.persistence(PersistenceAdapter::new(Arc::new(store)));
            }
            Err(e) => error!("Cache directory unusable, running in memory only: {}", e),
        }
    }

    let manager = Arc::new(builder.build());
    let adapter = WalletAdapter::new(Arc::clone(&manager));

    let summaries = adapter.get_batch_summaries(&addresses).await;
    let ordered: Vec<_> = addresses
        .iter()
        .filter_map(|address| summaries.get(address))
        .collect();
    println!("{}", serde_json::to_string_pretty(&ordered)?);

    let perf = adapter.performance_metrics();
    info!(
        "Loaded {} wallets in {:.1} ms (cache hit rate {:.0}%)",
        ordered.len(),
        perf.average_load_time_ms,
        perf.cache_hit_rate * 100.0
    );
    debug!(
        "Metrics: {}",
        serde_json::to_string(&manager.metrics().summary())?
    );

    manager.shutdown().await;
    Ok(())
}
