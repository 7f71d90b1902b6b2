//! Treasury snapshot endpoint.
//!
//! GET /api/treasury — the aggregated snapshot, served from the 60 s cache.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde_json::json;
use tracing::error;

use cairn_common::CairnError;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/treasury", get(get_treasury))
}

async fn get_treasury(State(state): State<Arc<AppState>>) -> Response {
    match state.treasury_snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e @ CairnError::AllWalletsFailed) => {
            error!("snapshot unavailable: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!("snapshot failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
