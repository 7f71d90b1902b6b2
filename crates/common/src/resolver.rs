//! Asset identity resolution.
//!
//! Resolves a network-qualified asset reference to a display symbol and
//! decimals through an ordered fallback chain: statically configured project
//! assets, the wallet's own live balance data, the Algorand-native special
//! case, then the third-party metadata registry. Missing metadata degrades
//! to a synthesized placeholder, never an error.
//!
//! Also hosts the LP-token name parser: pool-share tokens are detected by
//! symbol and, where possible, split into their underlying pair.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{ALGO_DECIMALS, ALGO_SYMBOL, DEFAULT_DECIMALS};
use crate::traits::MetadataSource;
use crate::types::AssetRef;

/// Resolved display metadata for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub symbol: String,
    pub decimals: u32,
    pub display_name: Option<String>,
    /// Underlying pair, when the symbol marks a DEX pool-share token and a
    /// known naming pattern matched.
    pub lp_pair: Option<LpPair>,
}

impl ResolvedAsset {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            display_name: None,
            lp_pair: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// In-memory lookup table — backs both the configured project asset list
/// and the per-fetch live wallet data.
#[derive(Debug, Default)]
pub struct StaticAssets {
    map: HashMap<AssetRef, ResolvedAsset>,
}

impl StaticAssets {
    pub fn new(entries: impl IntoIterator<Item = (AssetRef, ResolvedAsset)>) -> Self {
        Self {
            map: entries.into_iter().collect(),
        }
    }
}

impl MetadataSource for StaticAssets {
    fn lookup(&self, asset: &AssetRef) -> Option<ResolvedAsset> {
        self.map.get(asset).cloned()
    }
}

/// Synthesized fallback when no source knows the asset.
pub fn placeholder(asset: &AssetRef) -> ResolvedAsset {
    match asset {
        AssetRef::Algorand { asset_id } => {
            ResolvedAsset::new(format!("Asset {asset_id}"), DEFAULT_DECIMALS)
        }
        // Aptos rows fall back to the raw type string as symbol.
        AssetRef::Aptos { asset_type } => {
            ResolvedAsset::new(asset_type.clone(), DEFAULT_DECIMALS)
        }
    }
}

/// Ordered-fallback resolver over the three metadata sources.
///
/// Evaluation order is fixed: configured assets are authoritative, live
/// wallet data covers assets the operator never listed, the third-party
/// registry is best-effort. Asset id 0 on Algorand resolves to ALGO before
/// the registry is consulted, so a stale or conflicting registry entry can
/// never rename the native asset.
pub struct AssetResolver<'a> {
    config: &'a dyn MetadataSource,
    live: &'a dyn MetadataSource,
    registry: Option<&'a dyn MetadataSource>,
}

impl<'a> AssetResolver<'a> {
    pub fn new(
        config: &'a dyn MetadataSource,
        live: &'a dyn MetadataSource,
        registry: Option<&'a dyn MetadataSource>,
    ) -> Self {
        Self {
            config,
            live,
            registry,
        }
    }

    pub fn resolve(&self, asset: &AssetRef) -> ResolvedAsset {
        self.try_resolve(asset)
            .unwrap_or_else(|| placeholder(asset))
    }

    /// Like [`resolve`](Self::resolve), but `None` when every source missed,
    /// for callers that supply their own fallback instead of the synthesized
    /// placeholder.
    pub fn try_resolve(&self, asset: &AssetRef) -> Option<ResolvedAsset> {
        let meta = if let Some(meta) = self.config.lookup(asset) {
            meta
        } else if let Some(meta) = self.live.lookup(asset) {
            meta
        } else if asset.is_algorand_native() {
            ResolvedAsset::new(ALGO_SYMBOL, ALGO_DECIMALS)
        } else {
            self.registry.and_then(|r| r.lookup(asset))?
        };
        Some(annotate_lp(meta))
    }
}

/// Attach the underlying pair to pool-share tokens, parsed from the longest
/// name string available on the resolved entry.
fn annotate_lp(mut meta: ResolvedAsset) -> ResolvedAsset {
    if meta.lp_pair.is_none() && is_lp_symbol(&meta.symbol) {
        let name = match &meta.display_name {
            Some(n) if n.len() > meta.symbol.len() => n.as_str(),
            _ => meta.symbol.as_str(),
        };
        meta.lp_pair = parse_lp_pair(name);
    }
    meta
}

// ── LP / pool tokens ────────────────────────────────────────────────

/// Underlying pair of a liquidity-pool share token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpPair {
    pub token_a: String,
    pub token_b: String,
}

// Known pool naming patterns, tried in order:
//   Tinyman v2: "TinymanPool2.0 USDC-ALGO"
//   Pact:       "USDC/xUSD [SI] PACT LP TKN"
//   Generic:    "TOKEN1-TOKEN2 ..."
static TINYMAN_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TinymanPool2\.0\s+([A-Z0-9]+)-([A-Z0-9]+)").unwrap());
static SLASH_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([A-Z0-9]+)/([A-Z0-9]+)").unwrap());
static DASH_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([A-Z0-9]+)-([A-Z0-9]+)").unwrap());

/// Whether a symbol denotes a DEX pool-share token.
pub fn is_lp_symbol(symbol: &str) -> bool {
    let lower = symbol.to_lowercase();
    symbol == "PLP" || symbol == "TMPOOL2" || lower.contains("tinyman") || lower.contains("pact")
}

/// Parse the underlying token pair out of an LP token's descriptive name.
/// Returns `None` when no known pattern matches; callers then display the
/// pool token as an opaque single asset.
pub fn parse_lp_pair(name: &str) -> Option<LpPair> {
    for re in [&*TINYMAN_PAIR, &*SLASH_PAIR, &*DASH_PAIR] {
        if let Some(caps) = re.captures(name) {
            return Some(LpPair {
                token_a: caps[1].to_uppercase(),
                token_b: caps[2].to_uppercase(),
            });
        }
    }
    None
}

/// Two-character visual placeholder for an unparseable pool token.
pub fn lp_placeholder(symbol: &str) -> String {
    symbol.chars().take(2).collect()
}
