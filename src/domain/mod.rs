//! Domain value objects and types.
//!
//! Addresses are validated once at construction so that every cache key in
//! the system is derived from a well-formed account address.

pub mod address;
pub mod errors;

pub use address::WalletAddress;
pub use errors::ValidationError;
