//! Webhook URL management and delivery history, self-address-only.
//!
//! `PUT/GET/DELETE /agents/{address}/webhook`,
//! `GET /agents/{address}/webhook/deliveries`.

use axum::extract::{Path, State};
use axum::Json;

use crate::auth::AuthenticatedAgent;
use crate::db::{agents, webhooks};
use crate::error::{RelayError, Result};
use crate::models::{WebhookDeliveryListResponse, WebhookDeliveryRecord, WebhookUrlRequest, WebhookUrlResponse};
use crate::state::AppState;
use crate::webhook::validator::validate_webhook_url;

fn check_ownership(agent: &AuthenticatedAgent, address: &str) -> Result<()> {
    if agent.address != address {
        return Err(RelayError::Forbidden(
            "cannot manage webhook for another agent".to_string(),
        ));
    }
    Ok(())
}

pub async fn set_webhook_url(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(address): Path<String>,
    Json(body): Json<WebhookUrlRequest>,
) -> Result<Json<WebhookUrlResponse>> {
    check_ownership(&agent, &address)?;

    if let Some(url) = &body.webhook_url {
        validate_webhook_url(url)
            .await
            .map_err(|reason| RelayError::InvalidAddress(format!("invalid webhook URL: {reason}")))?;
    }

    agents::set_webhook_url(&state.pool, &address, body.webhook_url.as_deref()).await?;
    Ok(Json(WebhookUrlResponse { webhook_url: body.webhook_url }))
}

pub async fn delete_webhook_url(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(address): Path<String>,
) -> Result<Json<WebhookUrlResponse>> {
    check_ownership(&agent, &address)?;
    agents::set_webhook_url(&state.pool, &address, None).await?;
    Ok(Json(WebhookUrlResponse { webhook_url: None }))
}

pub async fn get_webhook_url(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(address): Path<String>,
) -> Result<Json<WebhookUrlResponse>> {
    check_ownership(&agent, &address)?;
    let record = agents::get_agent(&state.pool, &address)
        .await?
        .ok_or_else(|| RelayError::NotFound("agent not found".to_string()))?;
    Ok(Json(WebhookUrlResponse { webhook_url: record.webhook_url }))
}

pub async fn list_webhook_deliveries(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Path(address): Path<String>,
) -> Result<Json<WebhookDeliveryListResponse>> {
    check_ownership(&agent, &address)?;
    let rows = webhooks::list_for_agent(&state.pool, &address).await?;
    let deliveries = rows
        .into_iter()
        .map(|r| WebhookDeliveryRecord {
            id: r.id,
            message_id: r.message_id,
            status: r.status,
            attempt: r.attempt,
            last_error: r.last_error,
        })
        .collect();
    Ok(Json(WebhookDeliveryListResponse { deliveries }))
}
