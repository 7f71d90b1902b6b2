//! USD pricing via CoinGecko, with a coarse process-wide cache.
//!
//! Only a fixed set of symbols is priceable; everything else is silently
//! excluded from the batch. Pricing is strictly best-effort: an upstream
//! failure yields an empty price map, never an error, so a CoinGecko outage
//! can only blank USD figures, not break a snapshot.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use cairn_common::error::{CairnError, CairnResult};

/// CoinGecko id for a token symbol, if the symbol is priceable at all.
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    match symbol.to_ascii_uppercase().as_str() {
        "APT" => Some("aptos"),
        "EMOJICOIN" => Some("emojicoin"),
        "HYPERION" => Some("hyperion"),
        "USDC" => Some("usd-coin"),
        "USDT" => Some("tether"),
        "WETH" => Some("weth"),
        "BTC" => Some("bitcoin"),
        _ => None,
    }
}

// ── HTTP client ─────────────────────────────────────────────────────

/// CoinGecko client — demo-key auth, retry on rate limit.
#[derive(Clone)]
pub struct PriceClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct PriceEntry {
    usd: Option<f64>,
}

impl PriceClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build CoinGecko HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// `GET /simple/price` for a batch of CoinGecko ids, in USD.
    pub async fn simple_price(&self, ids: &[&str]) -> CairnResult<HashMap<String, f64>> {
        let url = format!("{}/simple/price", self.base_url);
        let ids_param = ids.join(",");

        let mut retries = 0u32;
        let max_retries = 3;

        loop {
            let mut req = self
                .http
                .get(&url)
                .query(&[("ids", ids_param.as_str()), ("vs_currencies", "usd")]);
            if let Some(key) = &self.api_key {
                req = req.header("x-cg-demo-api-key", key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| CairnError::Network(e.to_string()))?;

            if resp.status() == 429 {
                retries += 1;
                if retries > max_retries {
                    return Err(CairnError::Upstream {
                        source_name: "coingecko".into(),
                        message: format!("rate limited after {max_retries} retries"),
                    });
                }
                let wait = Duration::from_millis(1000 * 2u64.pow(retries - 1));
                warn!(
                    "CoinGecko 429 — retrying in {:?} (attempt {retries}/{max_retries})",
                    wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status();
                return Err(CairnError::Upstream {
                    source_name: "coingecko".into(),
                    message: format!("{status}"),
                });
            }

            let body: HashMap<String, PriceEntry> = resp
                .json()
                .await
                .map_err(|e| CairnError::Parse(e.to_string()))?;

            return Ok(body
                .into_iter()
                .filter_map(|(id, entry)| entry.usd.map(|usd| (id, usd)))
                .collect());
        }
    }
}

// ── Cached service ──────────────────────────────────────────────────

struct PriceSlot {
    /// CoinGecko id → USD price.
    data: HashMap<String, f64>,
    fetched_at: Instant,
}

/// Pricing resolver with a single cache slot.
///
/// A fresh slot answers every request regardless of which symbols the last
/// fetch actually covered; a symbol absent from the cached set stays
/// unpriced until the TTL expires. Failed fetches are not cached, so the
/// next request retries.
pub struct PriceService {
    client: PriceClient,
    cache: RwLock<Option<PriceSlot>>,
    ttl: Duration,
}

pub const PRICE_TTL: Duration = Duration::from_secs(60);

impl PriceService {
    pub fn new(client: PriceClient) -> Self {
        Self::with_ttl(client, PRICE_TTL)
    }

    pub fn with_ttl(client: PriceClient, ttl: Duration) -> Self {
        Self {
            client,
            cache: RwLock::new(None),
            ttl,
        }
    }

    /// USD prices for the priceable subset of `symbols`, keyed by symbol.
    pub async fn prices_for(&self, symbols: &[String]) -> HashMap<String, f64> {
        {
            let slot = self.cache.read().await;
            if let Some(slot) = slot.as_ref() {
                if slot.fetched_at.elapsed() < self.ttl {
                    debug!("price cache hit");
                    return map_symbols(symbols, &slot.data);
                }
            }
        }

        let mut ids: Vec<&str> = symbols.iter().filter_map(|s| coingecko_id(s)).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return HashMap::new();
        }

        match self.client.simple_price(&ids).await {
            Ok(data) => {
                let out = map_symbols(symbols, &data);
                *self.cache.write().await = Some(PriceSlot {
                    data,
                    fetched_at: Instant::now(),
                });
                out
            }
            Err(e) => {
                warn!("price fetch failed: {e}");
                HashMap::new()
            }
        }
    }
}

fn map_symbols(symbols: &[String], by_id: &HashMap<String, f64>) -> HashMap<String, f64> {
    symbols
        .iter()
        .filter_map(|s| {
            let id = coingecko_id(s)?;
            by_id.get(id).map(|usd| (s.clone(), *usd))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_symbol_table() {
        assert_eq!(coingecko_id("APT"), Some("aptos"));
        assert_eq!(coingecko_id("apt"), Some("aptos"));
        assert_eq!(coingecko_id("USDC"), Some("usd-coin"));
        assert_eq!(coingecko_id("WEIRDTOKEN"), None);
    }

    #[tokio::test]
    async fn test_prices_for_maps_ids_back_to_symbols() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aptos": { "usd": 4.5 },
                "usd-coin": { "usd": 1.0 },
            })))
            .mount(&server)
            .await;

        let service = PriceService::new(PriceClient::new(&server.uri(), None));
        let prices = service
            .prices_for(&symbols(&["APT", "USDC", "WEIRDTOKEN"]))
            .await;
        assert_eq!(prices.get("APT"), Some(&4.5));
        assert_eq!(prices.get("USDC"), Some(&1.0));
        assert!(!prices.contains_key("WEIRDTOKEN"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_second_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aptos": { "usd": 4.5 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = PriceService::new(PriceClient::new(&server.uri(), None));
        let first = service.prices_for(&symbols(&["APT"])).await;
        let second = service.prices_for(&symbols(&["APT"])).await;
        assert_eq!(first.get("APT"), Some(&4.5));
        assert_eq!(second.get("APT"), Some(&4.5));
    }

    #[tokio::test]
    async fn test_cached_slot_answers_for_any_symbol_set() {
        // Coarse invalidation: a fresh slot fetched for APT is consulted
        // even when USDC is requested, so USDC stays unpriced until expiry.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aptos": { "usd": 4.5 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = PriceService::new(PriceClient::new(&server.uri(), None));
        service.prices_for(&symbols(&["APT"])).await;
        let prices = service.prices_for(&symbols(&["USDC"])).await;
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_unpriceable_symbols_skip_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let service = PriceService::new(PriceClient::new(&server.uri(), None));
        let prices = service.prices_for(&symbols(&["WEIRDTOKEN"])).await;
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_to_empty_map() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let service = PriceService::new(PriceClient::new(&server.uri(), None));
        let prices = service.prices_for(&symbols(&["APT"])).await;
        assert!(prices.is_empty());
    }
}
