//! `POST /federation/deliver` — inbound relay-to-relay envelope delivery.
//! Authenticated by the sending relay's signature, verified against a
//! known peer's public key, not by agent bearer token.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::db::relay_reputation;
use crate::error::{RelayError, Result};
use crate::federation::inbound::{verify_inbound, InboundRejection};
use crate::state::AppState;

pub async fn deliver(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>> {
    if !state.config.federation_enabled {
        return Err(RelayError::Unavailable("federation is disabled".to_string()));
    }

    let origin_relay = body.get("origin_relay").and_then(Value::as_str).map(str::to_string);
    if let Some(domain) = &origin_relay {
        if state.relay_reputation.is_blocked(&state.pool, domain).await.unwrap_or(false) {
            return Err(RelayError::Forbidden("peer relay is blocked".to_string()));
        }
    }

    let envelope = match verify_inbound(&state.pool, &body, state.config.federation_timestamp_max_age_secs).await {
        Ok(envelope) => envelope,
        Err(rejection) => {
            if let Some(domain) = &origin_relay {
                let _ = relay_reputation::record_failure(&state.pool, domain).await;
            }
            return Err(rejection_to_error(rejection));
        }
    };
    if let Some(domain) = &origin_relay {
        let _ = relay_reputation::record_success(&state.pool, domain).await;
    }

    let hop_count = body.get("hop_count").and_then(Value::as_i64).unwrap_or(0) as i32;
    if hop_count > state.config.federation_max_hops as i32 {
        return Err(RelayError::Forbidden("envelope exceeded the federation hop limit".to_string()));
    }

    let message_id = envelope
        .get("message_id")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::InvalidAddress("envelope missing message_id".to_string()))?
        .to_string();
    let from = envelope
        .get("from")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::InvalidAddress("envelope missing from".to_string()))?
        .to_string();
    let to = envelope
        .get("to")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::InvalidAddress("envelope missing to".to_string()))?
        .to_string();

    state.routing.route(envelope, &from, &to, &message_id, hop_count).await;

    Ok(Json(serde_json::json!({"status": "accepted"})))
}

fn rejection_to_error(rejection: InboundRejection) -> RelayError {
    match rejection {
        InboundRejection::UnknownPeer => RelayError::Forbidden("unknown federation peer".to_string()),
        InboundRejection::BadSignature => RelayError::Forbidden("invalid peer signature".to_string()),
        InboundRejection::Stale => RelayError::Forbidden("request timestamp too old".to_string()),
        InboundRejection::Malformed => RelayError::InvalidAddress("malformed federation request".to_string()),
    }
}
