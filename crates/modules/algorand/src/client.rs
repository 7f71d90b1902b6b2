//! Algorand HTTP clients — project backend (balances) and public indexer
//! (transactions).
//!
//! The backend wraps its payload in a JSON-encoded string field; the client
//! unwraps and parses it. Rate-limit aware with exponential backoff on 429.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use cairn_common::error::{CairnError, CairnResult};
use cairn_common::resolver::StaticAssets;
use cairn_common::traits::{MetadataSource, WalletSource};
use cairn_common::types::{NetworkId, NormalizedBalance, TxRecord};

use crate::convert;

/// Algorand client for one backend + indexer pair.
#[derive(Clone)]
pub struct AlgorandClient {
    http: Client,
    backend_url: String,
    indexer_url: String,
}

// ── Backend wallet payload ──────────────────────────────────────────

/// Outer backend response; `data` is a JSON string holding [`WalletData`].
#[derive(Deserialize, Debug)]
pub struct AccountResponse {
    pub data: String,
}

/// Parsed inner payload of the backend account endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct WalletData {
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
    #[serde(default)]
    pub stats: AccountStats,
}

/// One asset holding with server-side computed valuation.
#[derive(Deserialize, Debug, Clone)]
pub struct AssetHolding {
    #[serde(rename = "asset-id")]
    pub asset_id: u64,
    #[serde(rename = "unit-name", default)]
    pub unit_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub decimals: u32,
    /// Base units.
    #[serde(with = "cairn_common::types::raw_amount", default)]
    pub amount: u128,
    /// Upstream-computed USD value for the whole holding.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub tvl_change_24h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AccountStats {
    #[serde(default)]
    pub usd: f64,
    #[serde(default)]
    pub algo: f64,
}

// ── Indexer transaction payload ─────────────────────────────────────

#[derive(Deserialize, Debug)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<AlgorandTransaction>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AlgorandTransaction {
    pub id: String,
    #[serde(rename = "tx-type")]
    pub tx_type: String,
    pub sender: String,
    #[serde(rename = "round-time")]
    pub round_time: i64,
    #[serde(rename = "payment-transaction")]
    pub payment: Option<PaymentTransaction>,
    #[serde(rename = "asset-transfer-transaction")]
    pub asset_transfer: Option<AssetTransferTransaction>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaymentTransaction {
    #[serde(with = "cairn_common::types::raw_amount")]
    pub amount: u128,
    pub receiver: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AssetTransferTransaction {
    #[serde(with = "cairn_common::types::raw_amount")]
    pub amount: u128,
    pub receiver: String,
    #[serde(rename = "asset-id")]
    pub asset_id: u64,
}

impl AlgorandClient {
    pub fn new(backend_url: &str, indexer_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build Algorand HTTP client");

        Self {
            http,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            indexer_url: indexer_url.trim_end_matches('/').to_string(),
        }
    }

    /// Execute a GET with retry on 429.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> CairnResult<T> {
        let mut retries = 0u32;
        let max_retries = 3;

        loop {
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| CairnError::Network(e.to_string()))?;

            if resp.status() == 429 {
                retries += 1;
                if retries > max_retries {
                    return Err(CairnError::Upstream {
                        source_name: "algorand".into(),
                        message: format!("rate limited after {max_retries} retries"),
                    });
                }
                let wait = Duration::from_millis(1000 * 2u64.pow(retries - 1));
                warn!("Algorand 429 — retrying in {:?} (attempt {retries}/{max_retries})", wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(CairnError::Upstream {
                    source_name: "algorand".into(),
                    message: format!("{status}: {body}"),
                });
            }

            return resp
                .json::<T>()
                .await
                .map_err(|e| CairnError::Parse(e.to_string()));
        }
    }

    /// Fetch one wallet's asset holdings from the project backend.
    pub async fn account(&self, address: &str) -> CairnResult<WalletData> {
        let url = format!("{}/account/{}", self.backend_url, address);
        let outer: AccountResponse = self.get_json(&url).await?;
        let data: WalletData = serde_json::from_str(&outer.data)?;
        Ok(data)
    }

    /// Fetch one wallet's most recent transactions from the public indexer.
    pub async fn transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> CairnResult<Vec<AlgorandTransaction>> {
        let url = format!(
            "{}/v2/accounts/{}/transactions?limit={}",
            self.indexer_url, address, limit
        );
        let resp: TransactionsResponse = self.get_json(&url).await?;
        Ok(resp.transactions)
    }
}

// ── WalletSource implementation ─────────────────────────────────────

/// The Algorand module — wraps the client and implements [`WalletSource`].
pub struct AlgorandModule {
    client: AlgorandClient,
    config_assets: Arc<StaticAssets>,
    registry: Option<Arc<dyn MetadataSource>>,
}

impl AlgorandModule {
    pub fn new(
        client: AlgorandClient,
        config_assets: Arc<StaticAssets>,
        registry: Option<Arc<dyn MetadataSource>>,
    ) -> Self {
        Self {
            client,
            config_assets,
            registry,
        }
    }
}

#[async_trait]
impl WalletSource for AlgorandModule {
    fn network(&self) -> NetworkId {
        NetworkId::Algorand
    }

    async fn balances(&self, address: &str) -> CairnResult<Vec<NormalizedBalance>> {
        let data = self
            .client
            .account(address)
            .await
            .map_err(|e| e.for_wallet(address))?;
        Ok(convert::normalize_holdings(
            &data,
            self.config_assets.as_ref(),
            self.registry.as_deref(),
        ))
    }

    async fn transactions(
        &self,
        address: &str,
        label: &str,
        limit: usize,
    ) -> CairnResult<Vec<TxRecord>> {
        let txs = self
            .client
            .transactions(address, limit)
            .await
            .map_err(|e| e.for_wallet(address))?;
        Ok(txs
            .iter()
            .filter_map(|tx| convert::transform_transaction(tx, address, label))
            .collect())
    }
}
