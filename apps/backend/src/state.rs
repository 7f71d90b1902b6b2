//! Shared application state for the API server.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use cairn_common::types::TreasurySnapshot;
use cairn_common::CairnResult;
use cairn_core::Aggregator;

/// How long a computed snapshot keeps serving requests.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

struct SnapshotSlot {
    snapshot: TreasurySnapshot,
    fetched_at: Instant,
}

/// Backend application state — shared across all request handlers and the
/// background refresh task.
pub struct AppState {
    aggregator: Aggregator,
    cache: RwLock<Option<SnapshotSlot>>,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            cache: RwLock::new(None),
        }
    }

    /// The current treasury snapshot — cached copy if fresh, otherwise a
    /// full recompute. Failed rounds are never cached.
    pub async fn treasury_snapshot(&self) -> CairnResult<TreasurySnapshot> {
        {
            let slot = self.cache.read().await;
            if let Some(slot) = slot.as_ref() {
                if slot.fetched_at.elapsed() < SNAPSHOT_TTL {
                    debug!("snapshot cache hit");
                    return Ok(slot.snapshot.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Recompute the snapshot and replace the cache slot.
    pub async fn refresh(&self) -> CairnResult<TreasurySnapshot> {
        let snapshot = self.aggregator.snapshot().await?;
        *self.cache.write().await = Some(SnapshotSlot {
            snapshot: snapshot.clone(),
            fetched_at: Instant::now(),
        });
        Ok(snapshot)
    }
}
