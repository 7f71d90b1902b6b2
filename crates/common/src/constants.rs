//! Network-wide constants.

/// Algorand's native asset is addressed as asset id 0 everywhere upstream.
pub const ALGO_ASSET_ID: u64 = 0;
pub const ALGO_SYMBOL: &str = "ALGO";
pub const ALGO_DECIMALS: u32 = 6;

/// Aptos native coin (legacy coin standard).
pub const APT_COIN_TYPE: &str = "0x1::aptos_coin::AptosCoin";
pub const APT_SYMBOL: &str = "APT";
pub const APT_DECIMALS: u32 = 8;

/// Decimals assumed when no metadata source can resolve an asset.
pub const DEFAULT_DECIMALS: u32 = 6;

/// Algorand block explorer, transaction view.
pub const ALGORAND_EXPLORER_TX: &str = "https://allo.info/tx";

/// How many transactions the merged cross-wallet feed keeps.
pub const TX_FEED_CAP: usize = 20;

/// Per-wallet transaction fetch limit.
pub const TX_FETCH_LIMIT: usize = 20;
