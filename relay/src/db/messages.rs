//! Message persistence: the offline queue and its dedup guard.
//!
//! `status=queued AND deleted_at IS NULL AND (expires_at IS NULL OR
//! expires_at > now)` defines the inbox, matching the invariant in the
//! message data model.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub message_id: String,
    pub from_address: String,
    pub to_address: String,
    pub envelope: Value,
    pub thread_id: Option<String>,
}

/// Insert a seen message id; returns `false` if it was already present
/// (duplicate submission, per dedup invariant S5).
pub async fn record_message_id(pool: &AnyPool, message_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT INTO seen_message_ids (message_id) VALUES (?)")
        .bind(message_id)
        .execute(pool)
        .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db_err)) if is_unique_violation(&*db_err) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_unique_violation(db_err: &dyn sqlx::error::DatabaseError) -> bool {
    db_err.is_unique_violation()
}

pub async fn enqueue_message(
    pool: &AnyPool,
    message_id: &str,
    from_address: &str,
    to_address: &str,
    envelope: &Value,
    thread_id: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO messages (message_id, from_address, to_address, envelope, thread_id, expires_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message_id)
    .bind(from_address)
    .bind(to_address)
    .bind(envelope.to_string())
    .bind(thread_id)
    .bind(expires_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Messages in ascending insertion order for `address`'s inbox, matching the
/// single sender->recipient ordering guarantee.
pub async fn inbox_for(pool: &AnyPool, address: &str) -> Result<Vec<MessageRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT message_id, from_address, to_address, envelope, thread_id \
         FROM messages \
         WHERE to_address = ? AND status = 'queued' AND deleted_at IS NULL \
         AND (expires_at IS NULL OR expires_at > ?) \
         ORDER BY created_at ASC",
    )
    .bind(address)
    .bind(Utc::now().to_rfc3339())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| MessageRow {
            message_id: r.get("message_id"),
            from_address: r.get("from_address"),
            to_address: r.get("to_address"),
            envelope: serde_json::from_str(r.get::<&str, _>("envelope")).unwrap_or(Value::Null),
            thread_id: r.get("thread_id"),
        })
        .collect())
}

/// All messages (any status) sharing `thread_id` where `participant` is
/// either the sender or recipient, in ascending insertion order.
pub async fn thread_messages(
    pool: &AnyPool,
    thread_id: &str,
    participant: &str,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT message_id, from_address, to_address, envelope, thread_id \
         FROM messages \
         WHERE thread_id = ? AND deleted_at IS NULL \
         AND (from_address = ? OR to_address = ?) \
         ORDER BY created_at ASC",
    )
    .bind(thread_id)
    .bind(participant)
    .bind(participant)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| MessageRow {
            message_id: r.get("message_id"),
            from_address: r.get("from_address"),
            to_address: r.get("to_address"),
            envelope: serde_json::from_str(r.get::<&str, _>("envelope")).unwrap_or(Value::Null),
            thread_id: r.get("thread_id"),
        })
        .collect())
}

pub async fn message_by_id(pool: &AnyPool, message_id: &str) -> Result<Option<MessageRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT message_id, from_address, to_address, envelope, thread_id \
         FROM messages WHERE message_id = ? AND deleted_at IS NULL",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| MessageRow {
        message_id: r.get("message_id"),
        from_address: r.get("from_address"),
        to_address: r.get("to_address"),
        envelope: serde_json::from_str(r.get::<&str, _>("envelope")).unwrap_or(Value::Null),
        thread_id: r.get("thread_id"),
    }))
}

/// Batch-mark a set of message ids delivered in a single statement, matching
/// the "single transaction" requirement for inbox drain.
pub async fn mark_delivered(pool: &AnyPool, message_ids: &[String]) -> Result<(), sqlx::Error> {
    if message_ids.is_empty() {
        return Ok(());
    }
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    for id in message_ids {
        sqlx::query(
            "UPDATE messages SET status = 'delivered', delivered_at = ? \
             WHERE message_id = ?",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn expire_stale_messages(pool: &AnyPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE messages SET status = 'expired' \
         WHERE status = 'queued' AND expires_at IS NOT NULL AND expires_at <= ?",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Hard-purge messages past the retention window (default 90 days), per the
/// message lifecycle's final stage.
pub async fn purge_expired_messages(
    pool: &AnyPool,
    retention_days: i64,
) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let result = sqlx::query(
        "DELETE FROM messages WHERE status IN ('delivered', 'expired') AND created_at <= ?",
    )
    .bind(cutoff.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
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
    async fn dedup_rejects_repeat_message_id() {
        let pool = test_pool().await;
        assert!(record_message_id(&pool, "msg-1").await.unwrap());
        assert!(!record_message_id(&pool, "msg-1").await.unwrap());
    }

    #[tokio::test]
    async fn inbox_round_trip_and_drain() {
        let pool = test_pool().await;
        enqueue_message(
            &pool,
            "msg-1",
            "alice::relay.test",
            "bob::relay.test",
            &serde_json::json!({"payload": "abc"}),
            None,
            None,
        )
        .await
        .unwrap();

        let inbox = inbox_for(&pool, "bob::relay.test").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].from_address, "alice::relay.test");

        mark_delivered(&pool, &["msg-1".to_string()]).await.unwrap();
        let inbox_after = inbox_for(&pool, "bob::relay.test").await.unwrap();
        assert!(inbox_after.is_empty());
    }
}
