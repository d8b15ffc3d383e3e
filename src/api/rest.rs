// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Every endpoint here is a pull-only
// read of an already-computed snapshot (spec §6 "Control surface") — no
// endpoint here mutates trading state, because none exists to mutate.
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::api::ApiState;

/// Build the full REST + WebSocket router with CORS middleware and shared
/// state.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/opportunities", get(opportunities))
        .route("/api/v1/status", get(status))
        .route("/api/v1/config/filtering", get(filtering_config))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Latest ranked opportunity list (spec §6 "Pull endpoint returning the
/// latest opportunity list").
async fn opportunities(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.publish.get_latest())
}

/// Per-exchange health (spec §6 "Pull endpoint returning
/// `{exchange -> ExchangeStatus}`").
async fn status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.status.snapshot())
}

/// Current identity-filter thresholds (spec §6 "Pull endpoint returning
/// current filtering config").
async fn filtering_config(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.filtering.clone())
}
