//! Pending first-contact requests.

use chrono::Utc;
use serde_json::Value;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct HandshakeRow {
    pub id: i64,
    pub from_address: String,
    pub to_address: String,
    pub contact_card: Value,
    pub status: String,
}

pub async fn create_handshake(
    pool: &AnyPool,
    from_address: &str,
    to_address: &str,
    contact_card: &Value,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO handshakes (from_address, to_address, contact_card) VALUES (?, ?, ?) \
         RETURNING id",
    )
    .bind(from_address)
    .bind(to_address)
    .bind(contact_card.to_string())
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

pub async fn get_pending(
    pool: &AnyPool,
    to_address: &str,
) -> Result<Vec<HandshakeRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, from_address, to_address, contact_card, status FROM handshakes \
         WHERE to_address = ? AND status = 'pending'",
    )
    .bind(to_address)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| HandshakeRow {
            id: r.get("id"),
            from_address: r.get("from_address"),
            to_address: r.get("to_address"),
            contact_card: serde_json::from_str(r.get::<&str, _>("contact_card"))
                .unwrap_or(Value::Null),
            status: r.get("status"),
        })
        .collect())
}

pub async fn resolve_handshake(
    pool: &AnyPool,
    id: i64,
    approved: bool,
) -> Result<(), sqlx::Error> {
    let status = if approved { "approved" } else { "denied" };
    sqlx::query(
        "UPDATE handshakes SET status = ?, resolved_at = ? WHERE id = ?",
    )
    .bind(status)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn expire_stale_handshakes(pool: &AnyPool, ttl_hours: i64) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::hours(ttl_hours);
    let result = sqlx::query(
        "UPDATE handshakes SET status = 'expired' \
         WHERE status = 'pending' AND created_at <= ?",
    )
    .bind(cutoff.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
