//! Caching and fetch coordination for wallet snapshots.
//!
//! - **store**: TTL + FIFO-capacity snapshot table
//! - **coordinator**: one in-flight fetch per key
//! - **subscriptions**: per-key fan-out of updates
//! - **persistence**: best-effort durable mirror used to warm the cache

pub mod coordinator;
pub mod persistence;
pub mod store;
pub mod subscriptions;

pub use coordinator::FetchCoordinator;
pub use persistence::{DurableStore, FileStore, MemoryStore, PersistedEntry, PersistenceAdapter};
pub use store::{CacheEntry, CacheStore, Stored};
pub use subscriptions::{Listener, Subscription, SubscriptionHub};
