//! Cairn core — everything between the network modules and the HTTP API.
//!
//! Owns the project and environment configuration, the CoinGecko pricing
//! resolver with its TTL cache, the third-party ASA metadata registry, and
//! the aggregator that folds per-wallet fetches into one treasury snapshot.

pub mod aggregator;
pub mod config;
pub mod pricing;
pub mod registry;

pub use aggregator::Aggregator;
pub use config::{EnvConfig, ProjectConfig};
