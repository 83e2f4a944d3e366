//! Webhook delivery attempt records. The circuit-breaker state itself
//! (failure streak, open-until timestamp) lives in the owning agent's
//! `metadata` blob via [`crate::db::agents::patch_metadata`]; this table is
//! purely the delivery history used for the admin surface and retry sweep.

use chrono::Utc;
use serde_json::Value;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct WebhookDeliveryRow {
    pub id: i64,
    pub agent_address: String,
    pub message_id: String,
    pub url: String,
    pub status: String,
    pub attempt: i32,
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
}

pub async fn record_attempt(
    pool: &AnyPool,
    agent_address: &str,
    message_id: &str,
    url: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO webhook_deliveries (agent_address, message_id, url, status, attempt) \
         VALUES (?, ?, ?, 'pending', 0) RETURNING id",
    )
    .bind(agent_address)
    .bind(message_id)
    .bind(url)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

pub async fn mark_delivered(pool: &AnyPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE webhook_deliveries SET status = 'delivered', delivered_at = ? \
         WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    pool: &AnyPool,
    id: i64,
    next_attempt_at: Option<&str>,
    error: &str,
) -> Result<(), sqlx::Error> {
    let status = if next_attempt_at.is_some() {
        "pending"
    } else {
        "failed"
    };
    sqlx::query(
        "UPDATE webhook_deliveries SET status = ?, attempt = attempt + 1, \
         next_attempt_at = ?, last_error = ? WHERE id = ?",
    )
    .bind(status)
    .bind(next_attempt_at)
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn due_for_retry(pool: &AnyPool) -> Result<Vec<WebhookDeliveryRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, agent_address, message_id, url, status, attempt, next_attempt_at, last_error \
         FROM webhook_deliveries WHERE status = 'pending' \
         AND (next_attempt_at IS NULL OR next_attempt_at <= ?) \
         ORDER BY id ASC",
    )
    .bind(Utc::now().to_rfc3339())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_delivery).collect())
}

pub async fn list_for_agent(
    pool: &AnyPool,
    agent_address: &str,
) -> Result<Vec<WebhookDeliveryRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, agent_address, message_id, url, status, attempt, next_attempt_at, last_error \
         FROM webhook_deliveries WHERE agent_address = ? ORDER BY id DESC LIMIT 100",
    )
    .bind(agent_address)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_delivery).collect())
}

fn row_to_delivery(r: sqlx::any::AnyRow) -> WebhookDeliveryRow {
    WebhookDeliveryRow {
        id: r.get("id"),
        agent_address: r.get("agent_address"),
        message_id: r.get("message_id"),
        url: r.get("url"),
        status: r.get("status"),
        attempt: r.get("attempt"),
        next_attempt_at: r.get("next_attempt_at"),
        last_error: r.get("last_error"),
    }
}

/// Circuit-breaker fields read from an agent's metadata blob.
pub struct CircuitState {
    pub failure_streak: u32,
    pub open_until: Option<String>,
}

pub fn read_circuit_state(metadata: &Value) -> CircuitState {
    let breaker = metadata.get("webhook_circuit").cloned().unwrap_or(Value::Null);
    CircuitState {
        failure_streak: breaker
            .get("failure_streak")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        open_until: breaker
            .get("open_until")
            .and_then(Value::as_str)
            .map(String::from),
    }
}
