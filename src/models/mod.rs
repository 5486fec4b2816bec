//! Data models for wallet snapshots and the views derived from them.
//!
//! Raw explorer payloads are validated into these closed structs at the
//! client boundary; nothing past the client sees untyped JSON.

pub mod balance;
pub mod snapshot;
pub mod summary;
pub mod token;
pub mod transaction;

pub use balance::Balance;
pub use snapshot::WalletSnapshot;
pub use summary::{PerformanceSnapshot, TokenSummary, WalletSummary};
pub use token::{Token, TokenCategory};
pub use transaction::{Transaction, TransactionDirection, TransactionStatus};
