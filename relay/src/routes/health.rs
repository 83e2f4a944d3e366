//! `GET /health` — unauthenticated liveness probe.

use axum::extract::State;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        relay_domain: state.config.relay_domain.clone(),
    })
}
