//! Application service layer.
//!
//! The data manager owns caching and fetch coordination; the adapter turns
//! snapshots into UI-facing summaries and filtered token lists.

mod token_filter;
mod wallet_adapter;
mod wallet_data;

pub use token_filter::{apply_filters, filter_tokens, SortBy, SortOrder, TokenCategoryFilter, TokenFilters};
pub use wallet_adapter::{summarize, token_summary, WalletAdapter};
pub use wallet_data::{CacheStats, WalletDataManager, WalletDataManagerBuilder};
