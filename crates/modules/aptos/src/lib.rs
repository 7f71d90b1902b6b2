//! Aptos network module — indexer GraphQL balance fetcher (FA v2 + legacy
//! coins) and transform into the universal shapes.

pub mod client;
pub mod convert;

pub use client::{AptosClient, AptosModule};
