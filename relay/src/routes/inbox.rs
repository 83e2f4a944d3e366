//! Inbox endpoints: message retrieval, thread view, and receipt submission.
//!
//! `GET /inbox/{address}`, `GET /messages/thread/{thread_id}`,
//! `POST /messages/{message_id}/receipt`.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::AuthenticatedAgent;
use crate::db::messages;
use crate::error::{RelayError, Result};
use crate::models::{InboxResponse, ReceiptRequest, ReceiptResponse, ThreadResponse};
use crate::state::AppState;

pub async fn get_inbox(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(address): Path<String>,
) -> Result<Json<InboxResponse>> {
    if address != agent.address {
        return Err(RelayError::Forbidden(
            "cannot read another agent's inbox".to_string(),
        ));
    }

    let stored = messages::inbox_for(&state.pool, &address).await?;
    let ids: Vec<String> = stored.iter().map(|m| m.message_id.clone()).collect();
    let envelopes: Vec<Value> = stored.iter().map(|m| m.envelope.clone()).collect();

    if !ids.is_empty() {
        messages::mark_delivered(&state.pool, &ids).await?;
    }

    for row in &stored {
        let message_type = row.envelope.get("type").and_then(Value::as_str).unwrap_or("");
        if message_type.starts_with("receipt.") {
            continue;
        }
        let receipt = json!({
            "type": "receipt.delivered",
            "message_id": row.message_id,
            "timestamp": Utc::now().to_rfc3339(),
            "to": address,
        });
        state.connections.send_to(&row.from_address, receipt).await;
    }

    Ok(Json(InboxResponse {
        address,
        count: envelopes.len(),
        messages: envelopes,
    }))
}

pub async fn get_thread(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadResponse>> {
    let rows = messages::thread_messages(&state.pool, &thread_id, &agent.address).await?;
    if rows.is_empty() {
        return Err(RelayError::Forbidden(
            "thread not found or access denied".to_string(),
        ));
    }

    let envelopes: Vec<Value> = rows.into_iter().map(|r| r.envelope).collect();
    Ok(Json(ThreadResponse {
        thread_id,
        count: envelopes.len(),
        messages: envelopes,
    }))
}

pub async fn submit_receipt(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(message_id): Path<String>,
    Json(body): Json<ReceiptRequest>,
) -> Result<Json<ReceiptResponse>> {
    let msg = messages::message_by_id(&state.pool, &message_id)
        .await?
        .ok_or_else(|| RelayError::NotFound(format!("message not found: {message_id}")))?;

    if msg.to_address != agent.address {
        return Err(RelayError::Forbidden(
            "only the recipient can submit a receipt for this message".to_string(),
        ));
    }

    let receipt = json!({
        "type": body.receipt_type,
        "message_id": message_id,
        "timestamp": Utc::now().to_rfc3339(),
        "to": msg.from_address,
        "from": agent.address,
    });
    state.connections.send_to(&msg.from_address, receipt).await;

    Ok(Json(ReceiptResponse { status: "submitted", message_id }))
}
