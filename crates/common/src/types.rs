//! Universal data model — shared by the network modules, the aggregator,
//! and the HTTP API.
//!
//! All base-unit amounts travel as `u128` in memory and as decimal strings
//! on the wire, so no precision is lost in transport.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resolver::LpPair;

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Algorand,
    Aptos,
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Algorand => write!(f, "algorand"),
            NetworkId::Aptos => write!(f, "aptos"),
        }
    }
}

/// Network-qualified asset reference.
///
/// Algorand addresses fungible assets by integer id (0 = ALGO itself);
/// Aptos by an opaque coin/asset type string. References are never compared
/// across networks — identity is always (network, reference), which this
/// enum encodes structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRef {
    Algorand {
        #[serde(rename = "assetId")]
        asset_id: u64,
    },
    Aptos {
        #[serde(rename = "assetType")]
        asset_type: String,
    },
}

impl AssetRef {
    pub fn algorand(asset_id: u64) -> Self {
        AssetRef::Algorand { asset_id }
    }

    pub fn aptos(asset_type: impl Into<String>) -> Self {
        AssetRef::Aptos {
            asset_type: asset_type.into(),
        }
    }

    pub fn network(&self) -> NetworkId {
        match self {
            AssetRef::Algorand { .. } => NetworkId::Algorand,
            AssetRef::Aptos { .. } => NetworkId::Aptos,
        }
    }

    /// True for asset id 0 on Algorand — the network-native ALGO.
    pub fn is_algorand_native(&self) -> bool {
        matches!(self, AssetRef::Algorand { asset_id: 0 })
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::Algorand { asset_id } => write!(f, "{asset_id}"),
            AssetRef::Aptos { asset_type } => write!(f, "{asset_type}"),
        }
    }
}

/// Serialize a `u128` base-unit amount as a decimal string, accepting either
/// a string or an integer on input (upstream APIs use both).
pub mod raw_amount {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumOrStr {
            Num(u64),
            Str(String),
        }

        match NumOrStr::deserialize(d)? {
            NumOrStr::Num(n) => Ok(n as u128),
            NumOrStr::Str(s) => s.parse::<u128>().map_err(serde::de::Error::custom),
        }
    }
}

/// One asset holding, normalized into the cross-network shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedBalance {
    pub symbol: String,
    pub decimals: u32,
    /// Human-readable amount: `amount_raw / 10^decimals`.
    pub amount: f64,
    /// Exact base units.
    #[serde(rename = "amountRaw", with = "raw_amount")]
    pub amount_raw: u128,
    /// USD valuation. `None` means "unknown", never "zero".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd: Option<f64>,
    #[serde(flatten)]
    pub asset: AssetRef,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Underlying pair for DEX pool-share tokens, when parseable.
    #[serde(rename = "lpPair", skip_serializing_if = "Option::is_none")]
    pub lp_pair: Option<LpPair>,
}

/// Transfer direction relative to the owning wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// A value-transfer transaction attributed to one configured wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: String,
    /// ISO-8601 timestamp.
    pub ts: String,
    pub wallet_address: String,
    pub wallet_label: String,
    pub direction: Direction,
    #[serde(flatten)]
    pub asset: AssetRef,
    #[serde(with = "raw_amount")]
    pub amount: u128,
    pub sender: String,
    pub receiver: String,
    pub explorer_url: String,
}

/// One configured wallet's balances at a point in time.
///
/// Constructed fresh on every fetch cycle, never mutated in place. A failed
/// fetch still produces a record, flagged via `error` and contributing
/// nothing to aggregate totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub label: String,
    pub address: String,
    pub network: NetworkId,
    /// Sorted descending by USD value, ties broken by raw amount.
    pub balances: Vec<NormalizedBalance>,
    pub total_usd: f64,
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletRecord {
    /// Record for a wallet whose fetch failed this cycle.
    pub fn failed(
        label: &str,
        address: &str,
        network: NetworkId,
        message: String,
        now: String,
    ) -> Self {
        Self {
            label: label.to_string(),
            address: address.to_string(),
            network,
            balances: Vec::new(),
            total_usd: 0.0,
            last_updated: now,
            error: Some(message),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiatTotals {
    #[serde(rename = "USD")]
    pub usd: f64,
}

/// One ephemeral, fully-recomputed view of all configured wallets.
///
/// Derived on each refresh cycle; wallets and transactions are the source of
/// truth, the snapshot never is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasurySnapshot {
    /// Per-symbol portfolio totals in human units, e.g. `{ "ALGO": 123.4 }`.
    pub totals: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat_totals: Option<FiatTotals>,
    pub wallets: Vec<WalletRecord>,
    /// Newest first, capped at [`crate::constants::TX_FEED_CAP`].
    pub latest_txs: Vec<TxRecord>,
    pub last_updated: String,
}
