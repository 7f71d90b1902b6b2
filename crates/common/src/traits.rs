//! Contracts between the core aggregator and the network modules.
//!
//! Each supported network ships as a module crate implementing
//! [`WalletSource`]; the aggregator dispatches per-wallet fetches through
//! these trait objects and never touches network-specific wire shapes.

use async_trait::async_trait;

use crate::error::CairnResult;
use crate::resolver::ResolvedAsset;
use crate::types::{AssetRef, NetworkId, NormalizedBalance, TxRecord};

/// One prioritized metadata lookup strategy.
///
/// The asset identity resolver evaluates an ordered set of these — project
/// config, live wallet data, third-party registry — first hit wins.
pub trait MetadataSource: Send + Sync {
    fn lookup(&self, asset: &AssetRef) -> Option<ResolvedAsset>;
}

/// Per-network wallet data source.
#[async_trait]
pub trait WalletSource: Send + Sync {
    /// Network this source serves.
    fn network(&self) -> NetworkId;

    /// Fetch and normalize one wallet's balances.
    ///
    /// USD values are attached where the upstream provides them; networks
    /// priced through the separate pricing resolver return `usd: None` here.
    async fn balances(&self, address: &str) -> CairnResult<Vec<NormalizedBalance>>;

    /// Fetch and transform one wallet's recent value-transfer transactions.
    /// Networks without transaction support return an empty list.
    async fn transactions(
        &self,
        _address: &str,
        _label: &str,
        _limit: usize,
    ) -> CairnResult<Vec<TxRecord>> {
        Ok(Vec::new())
    }
}
