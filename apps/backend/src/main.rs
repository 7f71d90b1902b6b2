//! Cairn backend — treasury aggregation API.
//!
//! Responsibilities:
//! - Assemble the network modules, pricing resolver, and ASA registry
//! - Keep the treasury snapshot warm with a periodic refresh task
//! - Serve the snapshot and a liveness probe over REST

mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use cairn_common::traits::MetadataSource;
use cairn_core::pricing::{PriceClient, PriceService};
use cairn_core::registry::{self, AsaListClient, AsaRegistry};
use cairn_core::{Aggregator, EnvConfig, ProjectConfig};
use cairn_mod_algorand::{AlgorandClient, AlgorandModule};
use cairn_mod_aptos::{AptosClient, AptosModule};

use state::{AppState, SNAPSHOT_TTL};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let env = EnvConfig::from_env()?;
    let project = ProjectConfig::load()?;
    tracing::info!(project = %project.slug, "cairn backend starting");

    // Third-party ASA metadata, refreshed in the background.
    let asa_registry = Arc::new(AsaRegistry::new());
    registry::spawn_refresh(
        asa_registry.clone(),
        AsaListClient::new(&env.asa_metadata_url),
    );

    let pricing = Arc::new(PriceService::new(PriceClient::new(
        &env.coingecko_url,
        env.coingecko_api_key.clone(),
    )));

    let config_assets = Arc::new(project.asset_table());
    let mut aggregator = Aggregator::new(project, pricing);
    aggregator.add_source(Arc::new(AlgorandModule::new(
        AlgorandClient::new(&env.backend_url, &env.indexer_url),
        config_assets,
        Some(asa_registry as Arc<dyn MetadataSource>),
    )));
    aggregator.add_source(Arc::new(AptosModule::new(AptosClient::new(
        &env.aptos_graphql_url,
        env.aptos_api_key.clone(),
    ))));

    let state = Arc::new(AppState::new(aggregator));

    // One sequential warmer: each round finishes before the next sleep, so
    // refresh rounds never overlap.
    let warmer = state.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) = warmer.refresh().await {
                tracing::warn!("snapshot refresh failed: {e}");
            }
            tokio::time::sleep(SNAPSHOT_TTL).await;
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], env.port));
    tracing::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
