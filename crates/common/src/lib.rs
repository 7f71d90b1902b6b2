//! Shared types, traits, and errors for the cairn treasury aggregator.
//!
//! This is the leaf crate every other workspace member depends on. It holds
//! the universal data model (balances, transactions, snapshots), the
//! `WalletSource` / `MetadataSource` contracts between core and the network
//! modules, the amount normalizer, and the asset identity resolver.

pub mod amount;
pub mod constants;
pub mod error;
pub mod resolver;
pub mod traits;
pub mod types;

pub use error::{CairnError, CairnResult};
