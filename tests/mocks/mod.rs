//! Shared test doubles and fixtures for integration tests.

pub mod mock_wallet_api;

#[allow(unused_imports)]
pub use mock_wallet_api::{sample_wallet, token, MockWalletApi, WalletFixture};
