//! API routes for the cairn backend.

pub mod health;
pub mod treasury;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the API router with all routes.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(treasury::router())
}
