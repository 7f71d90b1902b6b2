//! Convert Algorand wire shapes → universal types.

use chrono::{SecondsFormat, TimeZone, Utc};

use cairn_common::amount::humanize;
use cairn_common::constants::ALGORAND_EXPLORER_TX;
use cairn_common::resolver::{placeholder, AssetResolver, ResolvedAsset, StaticAssets};
use cairn_common::traits::MetadataSource;
use cairn_common::types::{AssetRef, Direction, NormalizedBalance, TxRecord};

use crate::client::{AlgorandTransaction, WalletData};

/// Normalize the backend's asset holdings into the universal balance shape.
///
/// Zero-balance opt-in rows are dropped. Symbol and decimals go through the
/// resolver chain; the holding rows themselves act as the live-wallet source,
/// so an asset absent from the configured list still resolves from its own
/// row. When every source misses, only the symbol falls back to the
/// synthesized placeholder — the row's own decimals still scale the amount.
/// USD values are taken directly from the upstream-computed `value` field.
pub fn normalize_holdings(
    data: &WalletData,
    config: &dyn MetadataSource,
    registry: Option<&dyn MetadataSource>,
) -> Vec<NormalizedBalance> {
    let live = StaticAssets::new(data.assets.iter().filter_map(|h| {
        let symbol = h.unit_name.clone()?;
        let mut meta = ResolvedAsset::new(symbol, h.decimals);
        if let Some(name) = &h.name {
            meta = meta.with_name(name.clone());
        }
        Some((AssetRef::algorand(h.asset_id), meta))
    }));
    let resolver = AssetResolver::new(config, &live, registry);

    data.assets
        .iter()
        .filter(|h| h.amount > 0)
        .map(|h| {
            let asset = AssetRef::algorand(h.asset_id);
            let meta = resolver.try_resolve(&asset).unwrap_or_else(|| {
                let mut meta = placeholder(&asset);
                meta.decimals = h.decimals;
                meta
            });
            NormalizedBalance {
                symbol: meta.symbol,
                decimals: meta.decimals,
                amount: humanize(h.amount, meta.decimals as i32),
                amount_raw: h.amount,
                usd: h.value,
                asset,
                display_name: meta.display_name,
                lp_pair: meta.lp_pair,
            }
        })
        .collect()
}

/// Map one indexer transaction to the universal shape.
///
/// Only value transfers survive: `pay` and `axfer` kinds with their expected
/// sub-record present. Everything else maps to `None` and is dropped by the
/// caller.
pub fn transform_transaction(
    tx: &AlgorandTransaction,
    wallet_address: &str,
    wallet_label: &str,
) -> Option<TxRecord> {
    let (amount, asset, receiver) = match tx.tx_type.as_str() {
        "pay" => {
            let p = tx.payment.as_ref()?;
            (p.amount, AssetRef::algorand(0), p.receiver.clone())
        }
        "axfer" => {
            let a = tx.asset_transfer.as_ref()?;
            (a.amount, AssetRef::algorand(a.asset_id), a.receiver.clone())
        }
        _ => return None,
    };

    let direction = if receiver == wallet_address {
        Direction::In
    } else {
        Direction::Out
    };

    Some(TxRecord {
        hash: tx.id.clone(),
        ts: iso_from_unix(tx.round_time),
        wallet_address: wallet_address.to_string(),
        wallet_label: wallet_label.to_string(),
        direction,
        asset,
        amount,
        sender: tx.sender.clone(),
        receiver,
        explorer_url: format!("{ALGORAND_EXPLORER_TX}/{}", tx.id),
    })
}

fn iso_from_unix(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
