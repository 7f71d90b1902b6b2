//! Project and environment configuration.
//!
//! The project file describes *what* to aggregate: the named wallets per
//! network and the curated asset list that overrides every other metadata
//! source. A compiled-in default ships with the binary; operators point
//! `CAIRN_PROJECT_FILE` at a JSON file to replace it. Environment variables
//! only carry *where* to fetch from (upstream URLs, keys, listen port).

use std::env;
use std::fs;

use serde::{Deserialize, Serialize};

use cairn_common::resolver::{ResolvedAsset, StaticAssets};
use cairn_common::types::{AssetRef, NetworkId};
use cairn_common::{CairnError, CairnResult};

// ── Project config ──────────────────────────────────────────────────

/// One wallet the project tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWallet {
    pub label: String,
    pub address: String,
    pub network: NetworkId,
}

/// One curated asset entry — authoritative symbol/decimals for its ref.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAsset {
    #[serde(flatten)]
    pub asset: AssetRef,
    pub symbol: String,
    pub decimals: u32,
}

/// Top-level project description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub wallets: Vec<ProjectWallet>,
    #[serde(default)]
    pub assets: Vec<ProjectAsset>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            slug: "compx".into(),
            name: "Cairn Demo - CompX".into(),
            description: "Public, on-chain transparency dashboard for the CompX treasury."
                .into(),
            wallets: vec![
                wallet("Treasury", "TREASURY_ADDR_XXXXXXXXXXXXXX", NetworkId::Algorand),
                wallet("Ops", "OPS_ADDR_XXXXXXXXXXXXXXXXXXX", NetworkId::Algorand),
                wallet("Rewards", "REWARDS_ADDR_XXXXXXXXXXXXXXX", NetworkId::Algorand),
                wallet("Aptos Treasury", "0xAPTOS_TREASURY_ADDR", NetworkId::Aptos),
            ],
            assets: vec![
                asset(AssetRef::algorand(0), "ALGO", 6),
                asset(AssetRef::algorand(2994233666), "xUSD", 6),
                asset(AssetRef::algorand(1234567890), "COMPX", 6),
            ],
        }
    }
}

fn wallet(label: &str, address: &str, network: NetworkId) -> ProjectWallet {
    ProjectWallet {
        label: label.into(),
        address: address.into(),
        network,
    }
}

fn asset(asset: AssetRef, symbol: &str, decimals: u32) -> ProjectAsset {
    ProjectAsset {
        asset,
        symbol: symbol.into(),
        decimals,
    }
}

impl ProjectConfig {
    /// Load the project: `CAIRN_PROJECT_FILE` override or the compiled-in
    /// default. Always validated.
    pub fn load() -> CairnResult<Self> {
        let project = match env::var("CAIRN_PROJECT_FILE") {
            Ok(path) => {
                let raw = fs::read_to_string(&path).map_err(|e| {
                    CairnError::Config(format!("cannot read project file {path}: {e}"))
                })?;
                serde_json::from_str(&raw)
                    .map_err(|e| CairnError::Config(format!("invalid project file: {e}")))?
            }
            Err(_) => Self::default(),
        };
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> CairnResult<()> {
        if self.slug.is_empty() {
            return Err(CairnError::Config("project slug is empty".into()));
        }
        if self.name.is_empty() {
            return Err(CairnError::Config("project name is empty".into()));
        }
        if self.wallets.is_empty() {
            return Err(CairnError::Config("no wallets configured".into()));
        }
        for w in &self.wallets {
            if w.label.is_empty() || w.address.is_empty() {
                return Err(CairnError::Config(format!(
                    "wallet entry missing label or address: {:?}/{:?}",
                    w.label, w.address
                )));
            }
        }
        for a in &self.assets {
            if a.symbol.is_empty() {
                return Err(CairnError::Config(format!(
                    "asset {} has an empty symbol",
                    a.asset
                )));
            }
        }
        let mut refs: Vec<&AssetRef> = self.assets.iter().map(|a| &a.asset).collect();
        refs.sort_by_key(|r| r.to_string());
        refs.dedup();
        if refs.len() != self.assets.len() {
            return Err(CairnError::Config("duplicate asset reference".into()));
        }
        Ok(())
    }

    /// The curated asset list as a metadata source — the highest-priority
    /// link of the resolver chain.
    pub fn asset_table(&self) -> StaticAssets {
        StaticAssets::new(self.assets.iter().map(|a| {
            (
                a.asset.clone(),
                ResolvedAsset::new(a.symbol.clone(), a.decimals),
            )
        }))
    }
}

// ── Environment config ──────────────────────────────────────────────

/// Upstream endpoints and service settings, read once at startup.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Project backend serving enriched Algorand account data.
    pub backend_url: String,
    /// Public Algorand indexer (transactions).
    pub indexer_url: String,
    /// Aptos indexer GraphQL endpoint.
    pub aptos_graphql_url: String,
    pub aptos_api_key: Option<String>,
    /// Tinyman ASA metadata list.
    pub asa_metadata_url: String,
    /// CoinGecko API base.
    pub coingecko_url: String,
    pub coingecko_api_key: Option<String>,
    pub port: u16,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl EnvConfig {
    pub fn from_env() -> CairnResult<Self> {
        let port = var_or("CAIRN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| CairnError::Config(format!("invalid CAIRN_PORT: {e}")))?;

        Ok(Self {
            backend_url: var_or("CAIRN_BACKEND_URL", "https://api.compx.io"),
            indexer_url: var_or("CAIRN_INDEXER_URL", "https://mainnet-idx.4160.nodely.dev"),
            aptos_graphql_url: var_or(
                "CAIRN_APTOS_GRAPHQL_URL",
                "https://indexer.mainnet.aptoslabs.com/v1/graphql",
            ),
            aptos_api_key: env::var("APTOS_API_KEY").ok(),
            asa_metadata_url: var_or(
                "CAIRN_ASA_METADATA_URL",
                "https://asa-list.tinyman.org/assets.json",
            ),
            coingecko_url: var_or("CAIRN_COINGECKO_URL", "https://api.coingecko.com/api/v3"),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok(),
            port,
        })
    }
}
