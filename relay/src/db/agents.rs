//! Agent registration records: address, public key, bearer token, webhook.

use serde_json::Value;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct AgentRow {
    pub address: String,
    pub public_key: String,
    pub token: String,
    pub webhook_url: Option<String>,
    pub verified_domain: Option<String>,
    pub metadata: Value,
}

pub async fn insert_agent(
    pool: &AnyPool,
    address: &str,
    public_key: &str,
    token: &str,
    webhook_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO agents (address, public_key, token, webhook_url, metadata) \
         VALUES (?, ?, ?, ?, '{}')",
    )
    .bind(address)
    .bind(public_key)
    .bind(token)
    .bind(webhook_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_agent(pool: &AnyPool, address: &str) -> Result<Option<AgentRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT address, public_key, token, webhook_url, verified_domain, metadata \
         FROM agents WHERE address = ? AND deleted_at IS NULL",
    )
    .bind(address)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| AgentRow {
        address: r.get("address"),
        public_key: r.get("public_key"),
        token: r.get("token"),
        webhook_url: r.get("webhook_url"),
        verified_domain: r.get("verified_domain"),
        metadata: serde_json::from_str(r.get::<&str, _>("metadata")).unwrap_or(Value::Null),
    }))
}

pub async fn get_agent_by_token(pool: &AnyPool, token: &str) -> Result<Option<AgentRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT address, public_key, token, webhook_url, verified_domain, metadata \
         FROM agents WHERE token = ? AND deleted_at IS NULL",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| AgentRow {
        address: r.get("address"),
        public_key: r.get("public_key"),
        token: r.get("token"),
        webhook_url: r.get("webhook_url"),
        verified_domain: r.get("verified_domain"),
        metadata: serde_json::from_str(r.get::<&str, _>("metadata")).unwrap_or(Value::Null),
    }))
}

pub async fn set_webhook_url(
    pool: &AnyPool,
    address: &str,
    webhook_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE agents SET webhook_url = ? WHERE address = ?")
        .bind(webhook_url)
        .bind(address)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_verified_domain(
    pool: &AnyPool,
    address: &str,
    domain: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE agents SET verified_domain = ? WHERE address = ?")
        .bind(domain)
        .bind(address)
        .execute(pool)
        .await?;
    Ok(())
}

/// Merge `patch` into the agent's metadata JSON blob (used for the webhook
/// circuit breaker's open/closed state, §4's "lives in the agent's metadata
/// blob").
pub async fn patch_metadata(
    pool: &AnyPool,
    address: &str,
    patch: &Value,
) -> Result<(), sqlx::Error> {
    let current = get_agent(pool, address).await?;
    let mut metadata = current.map(|a| a.metadata).unwrap_or(Value::Null);
    if !metadata.is_object() {
        metadata = Value::Object(serde_json::Map::new());
    }
    if let (Value::Object(base), Value::Object(patch)) = (&mut metadata, patch) {
        for (k, v) in patch {
            base.insert(k.clone(), v.clone());
        }
    }
    sqlx::query("UPDATE agents SET metadata = ? WHERE address = ?")
        .bind(metadata.to_string())
        .bind(address)
        .execute(pool)
        .await?;
    Ok(())
}
