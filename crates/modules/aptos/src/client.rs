//! Aptos indexer GraphQL client.
//!
//! One request pulls both FA v2 balances and legacy coin balances (strictly
//! positive amounts, ordered descending); non-native legacy coin types are
//! enriched with a second `current_coin_infos` lookup. Bearer-token auth is
//! optional.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use cairn_common::constants::{APT_COIN_TYPE, APT_DECIMALS, APT_SYMBOL};
use cairn_common::error::{CairnError, CairnResult};
use cairn_common::traits::WalletSource;
use cairn_common::types::{NetworkId, NormalizedBalance};

use crate::convert;

const BALANCES_QUERY: &str = r#"
query AllBalances($address: String!) {
  current_fungible_asset_balances(
    where: {
      owner_address: { _eq: $address }
      amount: { _gt: "0" }
    }
    order_by: { amount: desc }
  ) {
    amount
    asset_type
    token_standard
    metadata { symbol decimals name }
  }

  current_coin_balances(
    where: {
      owner_address: { _eq: $address }
      amount: { _gt: "0" }
    }
    order_by: { amount: desc }
  ) {
    amount
    coin_type
  }
}"#;

const COIN_INFOS_QUERY: &str = r#"
query CoinInfos($types: [String!]) {
  current_coin_infos(where: { coin_type: { _in: $types } }) {
    coin_type
    symbol
    decimals
  }
}"#;

/// Aptos indexer GraphQL client.
#[derive(Clone)]
pub struct AptosClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

// ── GraphQL envelope ────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize, Debug)]
struct GraphQlError {
    message: String,
}

// ── Query result rows ───────────────────────────────────────────────

#[derive(Deserialize, Debug, Default)]
struct BalancesData {
    #[serde(default)]
    current_fungible_asset_balances: Vec<FaBalanceRow>,
    #[serde(default)]
    current_coin_balances: Vec<CoinBalanceRow>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FaBalanceRow {
    pub amount: String,
    pub asset_type: String,
    #[serde(default)]
    pub token_standard: Option<String>,
    #[serde(default)]
    pub metadata: Option<FaMetadata>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FaMetadata {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CoinBalanceRow {
    pub amount: String,
    pub coin_type: String,
}

#[derive(Deserialize, Debug, Default)]
struct CoinInfosData {
    #[serde(default)]
    current_coin_infos: Vec<CoinInfoRow>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CoinInfoRow {
    pub coin_type: String,
    pub symbol: String,
    pub decimals: u32,
}

/// One balance row after symbol/decimals resolution, before normalization.
#[derive(Debug, Clone)]
pub struct AptosRawBalance {
    pub symbol: String,
    pub decimals: u32,
    pub amount_raw: u128,
    pub asset_type: String,
    pub name: Option<String>,
}

impl AptosClient {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build Aptos HTTP client");

        Self {
            http,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> CairnResult<T> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .json(&GraphQlRequest { query, variables });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CairnError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CairnError::Upstream {
                source_name: "aptos-indexer".into(),
                message: format!("{status}"),
            });
        }

        let body: GraphQlResponse<T> = resp
            .json()
            .await
            .map_err(|e| CairnError::Parse(e.to_string()))?;

        if let Some(errors) = body.errors {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CairnError::Upstream {
                source_name: "aptos-indexer".into(),
                message,
            });
        }

        body.data.ok_or_else(|| CairnError::Upstream {
            source_name: "aptos-indexer".into(),
            message: "null data".into(),
        })
    }

    /// Fetch FA v2 + legacy coin balances for one wallet, merged into a
    /// single resolved list.
    pub async fn balances(&self, address: &str) -> CairnResult<Vec<AptosRawBalance>> {
        let data: BalancesData = self
            .query(
                BALANCES_QUERY,
                serde_json::json!({ "address": address }),
            )
            .await?;

        // Enrich legacy coins other than APT with symbol/decimals from the
        // coin-info registry. Failure here only degrades those rows.
        let other_types: Vec<String> = data
            .current_coin_balances
            .iter()
            .map(|r| r.coin_type.clone())
            .filter(|t| t.as_str() != APT_COIN_TYPE)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let coin_infos: HashMap<String, CoinInfoRow> = if other_types.is_empty() {
            HashMap::new()
        } else {
            match self
                .query::<CoinInfosData>(
                    COIN_INFOS_QUERY,
                    serde_json::json!({ "types": other_types }),
                )
                .await
            {
                Ok(infos) => infos
                    .current_coin_infos
                    .into_iter()
                    .map(|i| (i.coin_type.clone(), i))
                    .collect(),
                Err(e) => {
                    warn!("Aptos coin-info lookup failed: {e}");
                    HashMap::new()
                }
            }
        };

        let mut out: Vec<AptosRawBalance> = data
            .current_fungible_asset_balances
            .iter()
            .map(resolve_fa_row)
            .collect();
        out.extend(
            data.current_coin_balances
                .iter()
                .map(|r| resolve_coin_row(r, &coin_infos)),
        );
        Ok(out)
    }
}

fn parse_amount(s: &str) -> u128 {
    s.parse().unwrap_or(0)
}

fn resolve_fa_row(row: &FaBalanceRow) -> AptosRawBalance {
    let meta = row.metadata.as_ref();
    AptosRawBalance {
        symbol: meta
            .and_then(|m| m.symbol.clone())
            .unwrap_or_else(|| row.asset_type.clone()),
        decimals: meta.and_then(|m| m.decimals).unwrap_or(0),
        amount_raw: parse_amount(&row.amount),
        asset_type: row.asset_type.clone(),
        name: meta.and_then(|m| m.name.clone()),
    }
}

fn resolve_coin_row(
    row: &CoinBalanceRow,
    coin_infos: &HashMap<String, CoinInfoRow>,
) -> AptosRawBalance {
    let (symbol, decimals) = if row.coin_type == APT_COIN_TYPE {
        // The native coin is not in the coin-info registry.
        (APT_SYMBOL.to_string(), APT_DECIMALS)
    } else if let Some(info) = coin_infos.get(&row.coin_type) {
        (info.symbol.clone(), info.decimals)
    } else {
        (row.coin_type.clone(), 0)
    };

    AptosRawBalance {
        symbol,
        decimals,
        amount_raw: parse_amount(&row.amount),
        asset_type: row.coin_type.clone(),
        name: None,
    }
}

// ── WalletSource implementation ─────────────────────────────────────

/// The Aptos module — wraps the client and implements [`WalletSource`].
///
/// USD values are left unset; the aggregator applies the pricing resolver
/// as a separate step.
pub struct AptosModule {
    client: AptosClient,
}

impl AptosModule {
    pub fn new(client: AptosClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WalletSource for AptosModule {
    fn network(&self) -> NetworkId {
        NetworkId::Aptos
    }

    async fn balances(&self, address: &str) -> CairnResult<Vec<NormalizedBalance>> {
        let raw = self
            .client
            .balances(address)
            .await
            .map_err(|e| e.for_wallet(address))?;
        Ok(raw.iter().map(convert::normalize_balance).collect())
    }
}
