//! Third-party ASA metadata registry.
//!
//! Mirrors the Tinyman ASA list into memory and serves it through the
//! resolver's [`MetadataSource`] contract. The list changes rarely, so a
//! background task refreshes it every 30 minutes; each round retries with
//! exponential backoff before giving up until the next interval. Deleted
//! assets stay in the map but never resolve.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use cairn_common::error::{CairnError, CairnResult};
use cairn_common::resolver::ResolvedAsset;
use cairn_common::traits::MetadataSource;
use cairn_common::types::AssetRef;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);
const FETCH_ATTEMPTS: u32 = 3;

// ── Wire shape (assets.json) ────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct AsaLogo {
    #[serde(default)]
    pub png: Option<String>,
    #[serde(default)]
    pub svg: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AsaMetadata {
    #[serde(default)]
    pub name: String,
    pub unit_name: String,
    pub decimals: u32,
    #[serde(default)]
    pub logo: Option<AsaLogo>,
    #[serde(default)]
    pub deleted: bool,
}

// ── Fetch client ────────────────────────────────────────────────────

/// Fetches the full ASA list. One big JSON map keyed by asset-id string.
#[derive(Clone)]
pub struct AsaListClient {
    http: Client,
    url: String,
}

impl AsaListClient {
    pub fn new(url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build ASA list HTTP client");

        Self {
            http,
            url: url.to_string(),
        }
    }

    pub async fn fetch(&self) -> CairnResult<HashMap<u64, AsaMetadata>> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CairnError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CairnError::Upstream {
                source_name: "asa-list".into(),
                message: format!("{status}"),
            });
        }

        let raw: HashMap<String, AsaMetadata> = resp
            .json()
            .await
            .map_err(|e| CairnError::Parse(e.to_string()))?;

        // Non-numeric keys are malformed entries; skip them.
        Ok(raw
            .into_iter()
            .filter_map(|(id, meta)| id.parse::<u64>().ok().map(|id| (id, meta)))
            .collect())
    }
}

// ── Shared registry ─────────────────────────────────────────────────

/// Shared, swap-on-refresh view of the ASA list.
#[derive(Default)]
pub struct AsaRegistry {
    entries: RwLock<HashMap<u64, AsaMetadata>>,
}

impl AsaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, entries: HashMap<u64, AsaMetadata>) {
        let count = entries.len();
        match self.entries.write() {
            Ok(mut guard) => {
                *guard = entries;
                debug!("ASA registry refreshed: {count} entries");
            }
            Err(poisoned) => {
                *poisoned.into_inner() = entries;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataSource for AsaRegistry {
    fn lookup(&self, asset: &AssetRef) -> Option<ResolvedAsset> {
        let AssetRef::Algorand { asset_id } = asset else {
            return None;
        };
        let guard = self.entries.read().ok()?;
        let meta = guard.get(asset_id)?;
        if meta.deleted {
            return None;
        }
        let mut resolved = ResolvedAsset::new(meta.unit_name.clone(), meta.decimals);
        if !meta.name.is_empty() {
            resolved = resolved.with_name(meta.name.clone());
        }
        Some(resolved)
    }
}

/// Spawn the 30-minute refresh loop. The first round runs immediately so
/// the registry is warm before the first snapshot needs it.
pub fn spawn_refresh(registry: Arc<AsaRegistry>, client: AsaListClient) {
    tokio::spawn(async move {
        loop {
            match fetch_with_retry(&client).await {
                Ok(entries) => registry.replace(entries),
                Err(e) => warn!("ASA registry refresh failed: {e}"),
            }
            tokio::time::sleep(REFRESH_INTERVAL).await;
        }
    });
}

async fn fetch_with_retry(client: &AsaListClient) -> CairnResult<HashMap<u64, AsaMetadata>> {
    let mut attempt = 0u32;
    loop {
        match client.fetch().await {
            Ok(entries) => return Ok(entries),
            Err(e) if attempt + 1 < FETCH_ATTEMPTS => {
                let wait = Duration::from_millis((1000 * 2u64.pow(attempt)).min(30_000));
                warn!(
                    "ASA list fetch failed ({e}) — retrying in {:?} (attempt {}/{FETCH_ATTEMPTS})",
                    wait,
                    attempt + 1
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
