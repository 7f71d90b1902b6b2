//! Algorand network module — backend wallet fetcher, public indexer
//! transaction fetcher, and transforms into the universal shapes.

pub mod client;
pub mod convert;

pub use client::{AlgorandClient, AlgorandModule};
