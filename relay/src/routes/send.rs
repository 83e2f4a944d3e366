//! `POST /send` — bearer-authenticated envelope submission.

use axum::extract::State;
use axum::Json;
use relay_protocol::Envelope;

use crate::auth::AuthenticatedAgent;
use crate::error::{RelayError, Result};
use crate::models::{SendRequest, SendResponse};
use crate::routing::Outcome;
use crate::state::AppState;

pub async fn send(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Json(body): Json<SendRequest>,
) -> Result<Json<SendResponse>> {
    let envelope = Envelope::from_wire(&body.envelope)?;

    if envelope.from != agent.address {
        return Err(RelayError::Forbidden(
            "envelope 'from' must match the authenticated agent".to_string(),
        ));
    }
    envelope
        .verify_with_key_str(&agent.public_key)
        .map_err(RelayError::from)?;

    let message_id = envelope.message_id.to_string();
    let wire = envelope.to_wire()?;
    let outcome = state
        .routing
        .route(wire, &envelope.from, &envelope.to, &message_id, 0)
        .await;

    match outcome {
        Outcome::Rejected("duplicate") => Err(RelayError::Duplicate),
        Outcome::Rejected("rate_limited") => Err(RelayError::RateLimited),
        Outcome::Rejected("blocked") => Err(RelayError::Blocked),
        Outcome::Rejected(reason) => Err(RelayError::Internal(reason.to_string())),
        Outcome::Delivered | Outcome::Queued | Outcome::Federated => Ok(Json(SendResponse {
            message_id,
            delivered: matches!(outcome, Outcome::Delivered),
        })),
    }
}
