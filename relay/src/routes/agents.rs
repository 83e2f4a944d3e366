//! `GET /agents/{address}/public-key` (unauthenticated — needed before any
//! handshake exists to encrypt the first SealedBox message) and
//! `GET /agents/{address}/presence` (bearer).

use axum::extract::{Path, State};
use axum::Json;

use crate::auth::AuthenticatedAgent;
use crate::db::agents;
use crate::error::{RelayError, Result};
use crate::models::{PresenceResponse, PublicKeyResponse};
use crate::state::AppState;

pub async fn public_key(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PublicKeyResponse>> {
    let agent = agents::get_agent(&state.pool, &address)
        .await?
        .ok_or_else(|| RelayError::NotFound(format!("agent not found: {address}")))?;

    let tier = if agent.verified_domain.is_some() { "2" } else { "1" };

    Ok(Json(PublicKeyResponse {
        address,
        public_key: agent.public_key,
        tier,
        verified_domain: agent.verified_domain,
    }))
}

pub async fn presence(
    State(state): State<AppState>,
    _agent: AuthenticatedAgent,
    Path(address): Path<String>,
) -> Result<Json<PresenceResponse>> {
    let target = agents::get_agent(&state.pool, &address)
        .await?
        .ok_or_else(|| RelayError::NotFound("agent not found".to_string()))?;

    let online = state.connections.is_online(&address).await;

    Ok(Json(PresenceResponse {
        address: target.address,
        online,
        last_seen: None,
    }))
}
