//! `WS /ws?token=...` — the persistent push channel. One task per
//! connection: a `tokio::select!` loop races inbound socket frames against
//! the outbox channel fed by [`crate::connections::ConnectionManager`].

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_protocol::Envelope;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::auth::verify_token_ws;
use crate::connections::Frame;
use crate::db::agents::AgentRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(agent) = verify_token_ws(&state.pool, &params.token).await else {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, agent: AgentRow) {
    let address = agent.address.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    state.connections.connect(&address, tx).await;
    state.heartbeat.record_connect(&address).await;
    info!(%address, "agent connected");

    if let Err(err) = state.routing.drain_inbox_on_reconnect(&address).await {
        debug!(%address, error = %err, "failed to drain inbox on reconnect");
    }

    // Set when a newer connection for this address evicted us: the map entry
    // is already the other task's, so the cleanup below must not touch it.
    let mut evicted = false;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(Frame::Message(value)) => {
                        let Ok(text) = serde_json::to_string(&value) else { continue };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Frame::Close { code, reason }) => {
                        let _ = socket
                            .send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
                            .await;
                        evicted = true;
                        break;
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound_frame(&state, &agent, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(%address, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    if !evicted {
        state.connections.disconnect(&address).await;
        state.heartbeat.record_disconnect(&address).await;
    }
    info!(%address, evicted, "agent disconnected");
}

/// A text frame from the agent is either a `{"type":"pong"}` heartbeat ack
/// or a full envelope the agent wants routed, same validation as `/send`.
async fn handle_inbound_frame(state: &AppState, agent: &AgentRow, text: &str) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        state
            .connections
            .send_to(&agent.address, json!({"error": "invalid_frame", "detail": "not valid JSON"}))
            .await;
        return;
    };

    if value.get("type").and_then(Value::as_str) == Some("pong") {
        state.heartbeat.record_pong(&agent.address).await;
        return;
    }

    let envelope = match Envelope::from_wire(&value) {
        Ok(envelope) => envelope,
        Err(err) => {
            state
                .connections
                .send_to(&agent.address, json!({"error": "invalid_envelope", "detail": err.to_string()}))
                .await;
            return;
        }
    };

    if envelope.from != agent.address {
        state
            .connections
            .send_to(&agent.address, json!({"error": "forbidden", "detail": "envelope 'from' must match the authenticated agent"}))
            .await;
        return;
    }
    if let Err(err) = envelope.verify_with_key_str(&agent.public_key) {
        state
            .connections
            .send_to(&agent.address, json!({"error": "signature_verification", "detail": err.to_string()}))
            .await;
        return;
    }

    let message_id = envelope.message_id.to_string();
    let wire = match envelope.to_wire() {
        Ok(wire) => wire,
        Err(_) => return,
    };
    let outcome = state.routing.route(wire, &envelope.from, &envelope.to, &message_id, 0).await;

    let delivered = matches!(outcome, crate::routing::Outcome::Delivered);
    state
        .connections
        .send_to(&agent.address, json!({"type": "ack", "message_id": message_id, "delivered": delivered}))
        .await;
}
