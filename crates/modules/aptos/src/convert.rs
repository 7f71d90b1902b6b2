//! Raw Aptos rows → the cross-network balance shape.

use cairn_common::amount::humanize;
use cairn_common::types::{AssetRef, NormalizedBalance};

use crate::client::AptosRawBalance;

/// Normalize one resolved Aptos row. USD stays unset here; the pricing
/// resolver fills it in during aggregation.
pub fn normalize_balance(raw: &AptosRawBalance) -> NormalizedBalance {
    NormalizedBalance {
        symbol: raw.symbol.clone(),
        decimals: raw.decimals,
        amount: humanize(raw.amount_raw, raw.decimals as i32),
        amount_raw: raw.amount_raw,
        usd: None,
        asset: AssetRef::aptos(raw.asset_type.clone()),
        display_name: raw.name.clone(),
        lp_pair: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_common::constants::APT_COIN_TYPE;

    #[test]
    fn test_normalize_apt_balance() {
        let raw = AptosRawBalance {
            symbol: "APT".into(),
            decimals: 8,
            amount_raw: 250_000_000,
            asset_type: APT_COIN_TYPE.into(),
            name: None,
        };
        let bal = normalize_balance(&raw);
        assert_eq!(bal.symbol, "APT");
        assert_eq!(bal.amount, 2.5);
        assert_eq!(bal.amount_raw, 250_000_000);
        assert_eq!(bal.usd, None);
        assert_eq!(bal.asset, AssetRef::aptos(APT_COIN_TYPE));
    }

    #[test]
    fn test_normalize_unresolved_coin_keeps_raw_type() {
        let raw = AptosRawBalance {
            symbol: "0xdef::legacy::Coin".into(),
            decimals: 0,
            amount_raw: 999,
            asset_type: "0xdef::legacy::Coin".into(),
            name: None,
        };
        let bal = normalize_balance(&raw);
        // Zero decimals: raw and human amount coincide
        assert_eq!(bal.amount, 999.0);
        assert_eq!(bal.symbol, "0xdef::legacy::Coin");
    }

    #[test]
    fn test_normalize_carries_display_name() {
        let raw = AptosRawBalance {
            symbol: "USDC".into(),
            decimals: 6,
            amount_raw: 12_345_678,
            asset_type: "0xabc::usdc::USDC".into(),
            name: Some("USD Coin".into()),
        };
        let bal = normalize_balance(&raw);
        assert_eq!(bal.amount, 12.345678);
        assert_eq!(bal.display_name.as_deref(), Some("USD Coin"));
    }
}
