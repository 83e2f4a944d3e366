//! Federation peer registry and the outbound forwarding queue. A peer row
//! records what another relay has told us about itself (its public key and
//! last-seen reputation); the outbox is the durable retry queue for
//! envelopes addressed to agents on those peers.

use chrono::Utc;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct PeerRow {
    pub domain: String,
    pub public_key: Option<String>,
    pub last_seen_at: Option<String>,
}

pub async fn upsert_peer(
    pool: &AnyPool,
    domain: &str,
    public_key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO federation_peers (domain, public_key, last_seen_at) \
         VALUES (?, ?, ?) \
         ON CONFLICT (domain) DO UPDATE SET public_key = excluded.public_key, \
         last_seen_at = excluded.last_seen_at",
    )
    .bind(domain)
    .bind(public_key)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_peer(pool: &AnyPool, domain: &str) -> Result<Option<PeerRow>, sqlx::Error> {
    let row = sqlx::query("SELECT domain, public_key, last_seen_at FROM federation_peers WHERE domain = ?")
        .bind(domain)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| PeerRow {
        domain: r.get("domain"),
        public_key: r.get("public_key"),
        last_seen_at: r.get("last_seen_at"),
    }))
}

#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: i64,
    pub target_domain: String,
    pub envelope_json: String,
    pub hop_count: i32,
    pub attempt: i32,
    pub next_attempt_at: Option<String>,
}

pub async fn enqueue(
    pool: &AnyPool,
    target_domain: &str,
    envelope_json: &str,
    hop_count: i32,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO federation_outbox (target_domain, envelope_json, hop_count, attempt, status) \
         VALUES (?, ?, ?, 0, 'pending') RETURNING id",
    )
    .bind(target_domain)
    .bind(envelope_json)
    .bind(hop_count)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

pub async fn due_for_retry(
    pool: &AnyPool,
    limit: i64,
) -> Result<Vec<OutboxRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, target_domain, envelope_json, hop_count, attempt, next_attempt_at \
         FROM federation_outbox WHERE status = 'pending' \
         AND (next_attempt_at IS NULL OR next_attempt_at <= ?) \
         ORDER BY id ASC LIMIT ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| OutboxRow {
            id: r.get("id"),
            target_domain: r.get("target_domain"),
            envelope_json: r.get("envelope_json"),
            hop_count: r.get("hop_count"),
            attempt: r.get("attempt"),
            next_attempt_at: r.get("next_attempt_at"),
        })
        .collect())
}

pub async fn mark_delivered(pool: &AnyPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE federation_outbox SET status = 'delivered' WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn reschedule(
    pool: &AnyPool,
    id: i64,
    next_attempt_at: Option<&str>,
) -> Result<(), sqlx::Error> {
    let status = if next_attempt_at.is_some() { "pending" } else { "dead" };
    sqlx::query(
        "UPDATE federation_outbox SET status = ?, attempt = attempt + 1, next_attempt_at = ? \
         WHERE id = ?",
    )
    .bind(status)
    .bind(next_attempt_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    async fn test_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn enqueued_item_is_immediately_due_for_retry() {
        let pool = test_pool().await;
        enqueue(&pool, "peer.example", "{}", 1).await.unwrap();
        let due = due_for_retry(&pool, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target_domain, "peer.example");
    }

    #[tokio::test]
    async fn delivered_item_drops_out_of_the_retry_queue() {
        let pool = test_pool().await;
        let id = enqueue(&pool, "peer.example", "{}", 1).await.unwrap();
        mark_delivered(&pool, id).await.unwrap();
        let due = due_for_retry(&pool, 10).await.unwrap();
        assert!(due.is_empty());
    }
}
