//! Token list filtering and ordering.
//!
//! Filters run in a fixed order: category, minimum USD value, zero balance,
//! text search, then sort. Sorting is stable, so ties keep their original
//! relative order.

use crate::models::{Token, TokenCategory, WalletSnapshot};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which slice of a wallet's holdings to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategoryFilter {
    /// The wallet's whole token list, including entries flagged as NFTs;
    /// the separate NFT list is only read by `Nft`
    #[default]
    All,
    Verified,
    Lp,
    /// NFTs plus any token flagged as non-fungible
    Nft,
    Regular,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Value,
    Amount,
    /// By symbol, case-insensitive
    Alphabetical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter and sort options for [`apply_filters`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenFilters {
    pub category: TokenCategoryFilter,

    /// Keep tokens whose USD value is at least this much
    pub min_value: Option<f64>,

    /// Drop tokens with a zero (or negative) amount
    pub hide_zero_balance: bool,

    /// Case-insensitive substring matched against name, symbol and id
    pub search: Option<String>,

    /// No sorting when absent
    pub sort_by: Option<SortBy>,

    pub sort_order: SortOrder,
}

/// Select, filter and order the tokens of `snapshot`.
pub fn apply_filters(snapshot: &WalletSnapshot, filters: &TokenFilters) -> Vec<Token> {
    let candidates = select_category(snapshot, filters.category);
    filter_tokens(candidates, filters)
}

fn select_category(snapshot: &WalletSnapshot, category: TokenCategoryFilter) -> Vec<Token> {
    let wanted = match category {
        TokenCategoryFilter::All => return snapshot.tokens.clone(),
        TokenCategoryFilter::Nft => {
            return snapshot
                .nfts
                .iter()
                .chain(snapshot.tokens.iter().filter(|t| t.is_nft))
                .cloned()
                .collect();
        }
        TokenCategoryFilter::Verified => TokenCategory::Verified,
        TokenCategoryFilter::Lp => TokenCategory::Lp,
        TokenCategoryFilter::Regular => TokenCategory::Regular,
    };

    snapshot
        .tokens
        .iter()
        .filter(|t| t.category() == wanted)
        .cloned()
        .collect()
}

/// Apply every filter after category selection, then sort.
pub fn filter_tokens(mut tokens: Vec<Token>, filters: &TokenFilters) -> Vec<Token> {
    if let Some(min_value) = filters.min_value {
        tokens.retain(|t| t.usd_value >= min_value);
    }

    if filters.hide_zero_balance {
        tokens.retain(Token::has_balance);
    }

    if let Some(query) = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    {
        let query = query.to_lowercase();
        tokens.retain(|t| {
            t.name.to_lowercase().contains(&query)
                || t.symbol.to_lowercase().contains(&query)
                || t.id.to_lowercase().contains(&query)
        });
    }

    if let Some(sort_by) = filters.sort_by {
        sort_tokens(&mut tokens, sort_by, filters.sort_order);
    }

    tokens
}

fn sort_tokens(tokens: &mut [Token], sort_by: SortBy, order: SortOrder) {
    let compare = |a: &Token, b: &Token| -> Ordering {
        match sort_by {
            SortBy::Value => a.usd_value.total_cmp(&b.usd_value),
            SortBy::Amount => a.amount.total_cmp(&b.amount),
            SortBy::Alphabetical => a.symbol.to_lowercase().cmp(&b.symbol.to_lowercase()),
        }
    };

    // slice::sort_by is stable; swapping arguments keeps ties in input order
    match order {
        SortOrder::Asc => tokens.sort_by(compare),
        SortOrder::Desc => tokens.sort_by(|a, b| compare(b, a)),
    }
}
