//! `POST /register` — the only public endpoint besides `/health`, rate
//! limited per client IP.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use relay_protocol::keys::deserialize_verify_key;
use relay_protocol::parse_address;
use relay_protocol::types::b64_encode;

use crate::db::agents;
use crate::error::{RelayError, Result};
use crate::models::{RegisterRequest, RegisterResponse};
use crate::state::AppState;
use crate::webhook::validator::validate_webhook_url;

pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    if !state.registration_limiter.check(&peer.ip().to_string(), None) {
        return Err(RelayError::RateLimited);
    }

    deserialize_verify_key(&body.public_key)
        .map_err(|_| RelayError::InvalidAddress("invalid public key".to_string()))?;

    let agent_name = body.agent_name.trim().to_lowercase();
    let address = format!("{agent_name}::{}", state.config.relay_domain);
    let parsed = parse_address(&address).map_err(|e| RelayError::InvalidAddress(e.to_string()))?;

    if state.spam_filter.is_blocked(&parsed.full()) {
        return Err(RelayError::Blocked);
    }

    if let Some(existing) = agents::get_agent(&state.pool, &parsed.full()).await? {
        if existing.public_key == body.public_key {
            return Ok(Json(RegisterResponse {
                address: existing.address,
                token: existing.token,
                relay: state.config.relay_ws_url.clone(),
            }));
        }
        return Err(RelayError::Forbidden(format!(
            "agent address already registered: {}",
            parsed.full()
        )));
    }

    if let Some(url) = &body.webhook_url {
        validate_webhook_url(url)
            .await
            .map_err(|reason| RelayError::InvalidAddress(format!("invalid webhook URL: {reason}")))?;
    }

    let token = generate_token();
    agents::insert_agent(
        &state.pool,
        &parsed.full(),
        &body.public_key,
        &token,
        body.webhook_url.as_deref(),
    )
    .await?;

    state
        .reputation
        .init_for_new_agent(&state.pool, &parsed.full(), false)
        .await?;

    Ok(Json(RegisterResponse {
        address: parsed.full(),
        token,
        relay: state.config.relay_ws_url.clone(),
    }))
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    b64_encode(&bytes)
}
