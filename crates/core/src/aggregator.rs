//! The treasury aggregator — folds per-wallet fetches into one snapshot.
//!
//! Every refresh recomputes the snapshot from scratch: one balance fetch and
//! one transaction fetch per configured wallet, all dispatched concurrently
//! through the registered [`WalletSource`] modules. A wallet failure is
//! absorbed into its own record; only the total loss of every wallet
//! surfaces as an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use cairn_common::constants::{TX_FEED_CAP, TX_FETCH_LIMIT};
use cairn_common::traits::WalletSource;
use cairn_common::types::{
    FiatTotals, NetworkId, NormalizedBalance, TreasurySnapshot, TxRecord, WalletRecord,
};
use cairn_common::{CairnError, CairnResult};

use crate::config::{ProjectConfig, ProjectWallet};
use crate::pricing::PriceService;

/// Orchestrates the per-network modules over the configured wallet set.
pub struct Aggregator {
    sources: HashMap<NetworkId, Arc<dyn WalletSource>>,
    pricing: Arc<PriceService>,
    project: ProjectConfig,
}

impl Aggregator {
    pub fn new(project: ProjectConfig, pricing: Arc<PriceService>) -> Self {
        Self {
            sources: HashMap::new(),
            pricing,
            project,
        }
    }

    /// Register a network module. One source per network; a second
    /// registration for the same network replaces the first.
    pub fn add_source(&mut self, source: Arc<dyn WalletSource>) {
        let network = source.network();
        info!(network = %network, "registered wallet source");
        self.sources.insert(network, source);
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    /// Compute a fresh treasury snapshot.
    ///
    /// Errors only when every configured wallet failed this round.
    pub async fn snapshot(&self) -> CairnResult<TreasurySnapshot> {
        let now = now_iso();
        let results = join_all(
            self.project
                .wallets
                .iter()
                .map(|w| self.fetch_wallet(w, &now)),
        )
        .await;

        let mut wallets = Vec::with_capacity(results.len());
        let mut all_txs = Vec::new();
        for (record, txs) in results {
            all_txs.extend(txs);
            wallets.push(record);
        }

        if wallets.iter().all(WalletRecord::is_failed) {
            return Err(CairnError::AllWalletsFailed);
        }

        self.apply_pricing(&mut wallets).await;

        for w in &mut wallets {
            sort_balances(&mut w.balances);
            w.total_usd = w.balances.iter().filter_map(|b| b.usd).sum();
        }

        let totals = sum_totals(&wallets);
        let fiat_usd = wallets.iter().map(|w| w.total_usd).sum();

        Ok(TreasurySnapshot {
            totals,
            fiat_totals: Some(FiatTotals { usd: fiat_usd }),
            wallets,
            latest_txs: merge_latest_txs(all_txs, TX_FEED_CAP),
            last_updated: now,
        })
    }

    /// One wallet's round: balances plus transactions, errors absorbed.
    async fn fetch_wallet(
        &self,
        wallet: &ProjectWallet,
        now: &str,
    ) -> (WalletRecord, Vec<TxRecord>) {
        let Some(source) = self.sources.get(&wallet.network) else {
            warn!(wallet = %wallet.label, network = %wallet.network, "no module registered");
            return (
                WalletRecord::failed(
                    &wallet.label,
                    &wallet.address,
                    wallet.network,
                    format!("no module registered for network {}", wallet.network),
                    now.to_string(),
                ),
                Vec::new(),
            );
        };

        // Both fetches run concurrently and degrade independently: a dead
        // balance backend must not blank a healthy indexer's feed, and a
        // feed gap never fails the record.
        let (balances, txs) = tokio::join!(
            source.balances(&wallet.address),
            source.transactions(&wallet.address, &wallet.label, TX_FETCH_LIMIT),
        );

        let txs = match txs {
            Ok(txs) => txs,
            Err(e) => {
                warn!(wallet = %wallet.label, error = %e, "transaction fetch failed");
                Vec::new()
            }
        };

        let record = match balances {
            Ok(balances) => WalletRecord {
                label: wallet.label.clone(),
                address: wallet.address.clone(),
                network: wallet.network,
                balances,
                total_usd: 0.0,
                last_updated: now.to_string(),
                error: None,
            },
            Err(e) => {
                warn!(wallet = %wallet.label, error = %e, "balance fetch failed");
                WalletRecord::failed(
                    &wallet.label,
                    &wallet.address,
                    wallet.network,
                    e.to_string(),
                    now.to_string(),
                )
            }
        };

        (record, txs)
    }

    /// Attach USD values to balances the modules left unpriced.
    async fn apply_pricing(&self, wallets: &mut [WalletRecord]) {
        let symbols: Vec<String> = wallets
            .iter()
            .flat_map(|w| &w.balances)
            .filter(|b| b.usd.is_none())
            .map(|b| b.symbol.clone())
            .collect();
        if symbols.is_empty() {
            return;
        }

        let prices = self.pricing.prices_for(&symbols).await;
        for w in wallets {
            apply_prices(&mut w.balances, &prices);
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Merge helpers ───────────────────────────────────────────────────

/// Per-symbol human-amount totals over the successful wallets.
fn sum_totals(wallets: &[WalletRecord]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for w in wallets.iter().filter(|w| !w.is_failed()) {
        for b in &w.balances {
            *totals.entry(b.symbol.clone()).or_insert(0.0) += b.amount;
        }
    }
    totals
}

/// Newest-first transaction feed, capped.
fn merge_latest_txs(mut txs: Vec<TxRecord>, cap: usize) -> Vec<TxRecord> {
    txs.sort_by(|a, b| b.ts.cmp(&a.ts));
    txs.truncate(cap);
    txs
}

/// Descending by USD value, ties broken by raw amount.
fn sort_balances(balances: &mut [NormalizedBalance]) {
    balances.sort_by(|a, b| {
        let ua = a.usd.unwrap_or(0.0);
        let ub = b.usd.unwrap_or(0.0);
        ub.partial_cmp(&ua)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.amount_raw.cmp(&a.amount_raw))
    });
}

fn apply_prices(balances: &mut [NormalizedBalance], prices: &HashMap<String, f64>) {
    for b in balances {
        if b.usd.is_none() {
            if let Some(price) = prices.get(&b.symbol) {
                b.usd = Some(b.amount * price);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cairn_common::types::{AssetRef, Direction};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::pricing::PriceClient;

    fn balance(symbol: &str, amount: f64, raw: u128, usd: Option<f64>) -> NormalizedBalance {
        NormalizedBalance {
            symbol: symbol.into(),
            decimals: 6,
            amount,
            amount_raw: raw,
            usd,
            asset: AssetRef::algorand(1),
            display_name: None,
            lp_pair: None,
        }
    }

    fn tx(hash: &str, ts: &str) -> TxRecord {
        TxRecord {
            hash: hash.into(),
            ts: ts.into(),
            wallet_address: "W".into(),
            wallet_label: "Treasury".into(),
            direction: Direction::In,
            asset: AssetRef::algorand(0),
            amount: 1,
            sender: "S".into(),
            receiver: "W".into(),
            explorer_url: format!("https://allo.info/tx/{hash}"),
        }
    }

    fn record(label: &str, balances: Vec<NormalizedBalance>) -> WalletRecord {
        WalletRecord {
            label: label.into(),
            address: format!("{label}_ADDR"),
            network: NetworkId::Algorand,
            balances,
            total_usd: 0.0,
            last_updated: "2025-01-01T00:00:00.000Z".into(),
            error: None,
        }
    }

    // ── Pure helpers ────────────────────────────────────────────

    #[test]
    fn test_sum_totals_merges_symbols_across_wallets() {
        let wallets = vec![
            record("A", vec![balance("ALGO", 10.0, 0, None)]),
            record("B", vec![balance("ALGO", 5.0, 0, None), balance("xUSD", 2.0, 0, None)]),
        ];
        let totals = sum_totals(&wallets);
        assert_eq!(totals["ALGO"], 15.0);
        assert_eq!(totals["xUSD"], 2.0);
    }

    #[test]
    fn test_sum_totals_skips_failed_wallets() {
        let ok = record("A", vec![balance("ALGO", 10.0, 0, None)]);
        let failed = WalletRecord::failed(
            "B",
            "B_ADDR",
            NetworkId::Algorand,
            "boom".into(),
            "2025-01-01T00:00:00.000Z".into(),
        );
        let totals = sum_totals(&[ok, failed]);
        assert_eq!(totals["ALGO"], 10.0);
        assert_eq!(totals.len(), 1);
    }

    #[test]
    fn test_merge_latest_txs_sorts_desc_and_caps() {
        let txs: Vec<TxRecord> = (0..30)
            .map(|i| tx(&format!("T{i}"), &format!("2025-01-01T00:00:{i:02}.000Z")))
            .collect();
        let merged = merge_latest_txs(txs, 20);
        assert_eq!(merged.len(), 20);
        assert_eq!(merged[0].hash, "T29");
        assert_eq!(merged[19].hash, "T10");
    }

    #[test]
    fn test_sort_balances_usd_desc_ties_by_raw() {
        let mut balances = vec![
            balance("LOW", 1.0, 5, Some(1.0)),
            balance("NOPRICE", 100.0, 999, None),
            balance("HIGH", 1.0, 1, Some(50.0)),
            balance("TIE_B", 2.0, 10, Some(1.0)),
        ];
        sort_balances(&mut balances);
        assert_eq!(balances[0].symbol, "HIGH");
        // Both at $1 — larger raw amount first
        assert_eq!(balances[1].symbol, "TIE_B");
        assert_eq!(balances[2].symbol, "LOW");
        assert_eq!(balances[3].symbol, "NOPRICE");
    }

    #[test]
    fn test_apply_prices_leaves_priced_rows_alone() {
        let mut balances = vec![
            balance("APT", 2.0, 0, None),
            balance("xUSD", 3.0, 0, Some(3.0)),
        ];
        let prices = HashMap::from([("APT".to_string(), 4.5), ("xUSD".to_string(), 99.0)]);
        apply_prices(&mut balances, &prices);
        assert_eq!(balances[0].usd, Some(9.0));
        assert_eq!(balances[1].usd, Some(3.0));
    }

    // ── Snapshot over mock sources ──────────────────────────────

    struct MockSource {
        network: NetworkId,
        balances: Vec<NormalizedBalance>,
        txs: Vec<TxRecord>,
        fail_balances: bool,
        fail_txs: bool,
    }

    impl MockSource {
        fn ok(network: NetworkId, balances: Vec<NormalizedBalance>, txs: Vec<TxRecord>) -> Self {
            Self {
                network,
                balances,
                txs,
                fail_balances: false,
                fail_txs: false,
            }
        }

        fn failing(network: NetworkId) -> Self {
            Self {
                network,
                balances: Vec::new(),
                txs: Vec::new(),
                fail_balances: true,
                fail_txs: true,
            }
        }
    }

    #[async_trait]
    impl WalletSource for MockSource {
        fn network(&self) -> NetworkId {
            self.network
        }

        async fn balances(&self, _address: &str) -> CairnResult<Vec<NormalizedBalance>> {
            if self.fail_balances {
                return Err(CairnError::Network("connection refused".into()));
            }
            Ok(self.balances.clone())
        }

        async fn transactions(
            &self,
            _address: &str,
            _label: &str,
            _limit: usize,
        ) -> CairnResult<Vec<TxRecord>> {
            if self.fail_txs {
                return Err(CairnError::Network("indexer down".into()));
            }
            Ok(self.txs.clone())
        }
    }

    fn project(wallets: Vec<(&str, NetworkId)>) -> ProjectConfig {
        ProjectConfig {
            slug: "test".into(),
            name: "Test".into(),
            description: String::new(),
            wallets: wallets
                .into_iter()
                .map(|(label, network)| ProjectWallet {
                    label: label.into(),
                    address: format!("{label}_ADDR"),
                    network,
                })
                .collect(),
            assets: Vec::new(),
        }
    }

    async fn offline_pricing() -> (MockServer, Arc<PriceService>) {
        // A pricing endpoint that always errors; USD attachment degrades
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let service = Arc::new(PriceService::new(PriceClient::new(&server.uri(), None)));
        (server, service)
    }

    #[tokio::test]
    async fn test_snapshot_absorbs_partial_failure() {
        let (_server, pricing) = offline_pricing().await;
        let mut agg = Aggregator::new(
            project(vec![("Good", NetworkId::Algorand), ("Bad", NetworkId::Aptos)]),
            pricing,
        );
        agg.add_source(Arc::new(MockSource::ok(
            NetworkId::Algorand,
            vec![balance("ALGO", 10.0, 10_000_000, Some(1.6))],
            vec![tx("T1", "2025-01-01T00:00:00.000Z")],
        )));
        agg.add_source(Arc::new(MockSource::failing(NetworkId::Aptos)));

        let snapshot = agg.snapshot().await.unwrap();
        assert_eq!(snapshot.wallets.len(), 2);

        let good = &snapshot.wallets[0];
        assert!(good.error.is_none());
        assert_eq!(good.total_usd, 1.6);

        let bad = &snapshot.wallets[1];
        assert!(bad.is_failed());
        assert!(bad.balances.is_empty());
        assert_eq!(bad.total_usd, 0.0);

        assert_eq!(snapshot.totals["ALGO"], 10.0);
        assert_eq!(snapshot.totals.len(), 1);
        assert_eq!(snapshot.latest_txs.len(), 1);
        assert_eq!(snapshot.fiat_totals.as_ref().unwrap().usd, 1.6);
    }

    #[tokio::test]
    async fn test_snapshot_fails_only_when_every_wallet_fails() {
        let (_server, pricing) = offline_pricing().await;
        let mut agg = Aggregator::new(
            project(vec![("A", NetworkId::Algorand), ("B", NetworkId::Algorand)]),
            pricing,
        );
        agg.add_source(Arc::new(MockSource::failing(NetworkId::Algorand)));

        let err = agg.snapshot().await.unwrap_err();
        assert!(matches!(err, CairnError::AllWalletsFailed));
    }

    #[tokio::test]
    async fn test_snapshot_fails_wallet_without_registered_module() {
        let (_server, pricing) = offline_pricing().await;
        let mut agg = Aggregator::new(
            project(vec![("Apt", NetworkId::Aptos), ("Algo", NetworkId::Algorand)]),
            pricing,
        );
        agg.add_source(Arc::new(MockSource::ok(NetworkId::Algorand, vec![], vec![])));

        let snapshot = agg.snapshot().await.unwrap();
        let apt = &snapshot.wallets[0];
        assert!(apt.is_failed());
        assert!(apt.error.as_ref().unwrap().contains("no module registered"));
    }

    #[tokio::test]
    async fn test_snapshot_prices_unpriced_balances() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aptos": { "usd": 4.5 },
            })))
            .mount(&server)
            .await;
        let pricing = Arc::new(PriceService::new(PriceClient::new(&server.uri(), None)));

        let mut apt_balance = balance("APT", 2.5, 250_000_000, None);
        apt_balance.asset = AssetRef::aptos("0x1::aptos_coin::AptosCoin");
        apt_balance.decimals = 8;

        let mut agg = Aggregator::new(project(vec![("Aptos", NetworkId::Aptos)]), pricing);
        agg.add_source(Arc::new(MockSource::ok(
            NetworkId::Aptos,
            vec![apt_balance],
            vec![],
        )));

        let snapshot = agg.snapshot().await.unwrap();
        let wallet = &snapshot.wallets[0];
        assert_eq!(wallet.balances[0].usd, Some(11.25));
        assert_eq!(wallet.total_usd, 11.25);
        assert_eq!(snapshot.fiat_totals.as_ref().unwrap().usd, 11.25);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_txs_when_balance_fetch_fails() {
        let (_server, pricing) = offline_pricing().await;
        let mut agg = Aggregator::new(
            project(vec![("Algo", NetworkId::Algorand), ("Apt", NetworkId::Aptos)]),
            pricing,
        );
        // Balance backend down, indexer healthy
        agg.add_source(Arc::new(MockSource {
            network: NetworkId::Algorand,
            balances: Vec::new(),
            txs: vec![tx("T1", "2025-01-01T00:00:00.000Z")],
            fail_balances: true,
            fail_txs: false,
        }));
        agg.add_source(Arc::new(MockSource::ok(NetworkId::Aptos, vec![], vec![])));

        let snapshot = agg.snapshot().await.unwrap();
        assert!(snapshot.wallets[0].is_failed());
        assert_eq!(snapshot.latest_txs.len(), 1);
        assert_eq!(snapshot.latest_txs[0].hash, "T1");
    }

    #[tokio::test]
    async fn test_snapshot_is_idempotent_over_fixed_upstreams() {
        let (_server, pricing) = offline_pricing().await;
        let mut agg = Aggregator::new(
            project(vec![("A", NetworkId::Algorand), ("B", NetworkId::Aptos)]),
            pricing,
        );
        agg.add_source(Arc::new(MockSource::ok(
            NetworkId::Algorand,
            vec![
                balance("ALGO", 10.0, 10_000_000, Some(1.6)),
                balance("xUSD", 2.5, 2_500_000, Some(2.5)),
            ],
            vec![tx("T1", "2025-01-01T00:00:00.000Z")],
        )));
        agg.add_source(Arc::new(MockSource::failing(NetworkId::Aptos)));

        let first = agg.snapshot().await.unwrap();
        let second = agg.snapshot().await.unwrap();

        // Identical contents apart from the timestamp fields
        let mut a = serde_json::to_value(&first).unwrap();
        let mut b = serde_json::to_value(&second).unwrap();
        for v in [&mut a, &mut b] {
            v["lastUpdated"] = serde_json::Value::Null;
            for w in v["wallets"].as_array_mut().unwrap() {
                w["lastUpdated"] = serde_json::Value::Null;
            }
        }
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_snapshot_tx_feed_degrades_per_wallet() {
        let (_server, pricing) = offline_pricing().await;
        let mut agg = Aggregator::new(project(vec![("A", NetworkId::Algorand)]), pricing);
        agg.add_source(Arc::new(MockSource {
            network: NetworkId::Algorand,
            balances: vec![balance("ALGO", 1.0, 1_000_000, None)],
            txs: Vec::new(),
            fail_balances: false,
            fail_txs: true,
        }));

        let snapshot = agg.snapshot().await.unwrap();
        assert!(snapshot.wallets[0].error.is_none());
        assert!(snapshot.latest_txs.is_empty());
    }
}
