//! Persisted domain-ownership verification records (Tier 2 status) and the
//! periodic re-verification sweep that downgrades stale entries.

use chrono::Utc;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone)]
pub struct VerificationRow {
    pub id: i64,
    pub agent_address: String,
    pub domain: String,
    pub public_key: String,
    pub method: String,
    pub status: String,
}

pub async fn record_verification(
    pool: &AnyPool,
    agent_address: &str,
    domain: &str,
    public_key: &str,
    method: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO domain_verifications (agent_address, domain, public_key, method, verified_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (agent_address, domain) DO UPDATE SET \
         public_key = excluded.public_key, method = excluded.method, \
         status = 'verified', verified_at = excluded.verified_at",
    )
    .bind(agent_address)
    .bind(domain)
    .bind(public_key)
    .bind(method)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_expired(
    pool: &AnyPool,
    ttl_hours: i64,
) -> Result<Vec<VerificationRow>, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::hours(ttl_hours);
    let rows = sqlx::query(
        "SELECT id, agent_address, domain, public_key, method, status FROM domain_verifications \
         WHERE status = 'verified' AND verified_at <= ?",
    )
    .bind(cutoff.to_rfc3339())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| VerificationRow {
            id: r.get("id"),
            agent_address: r.get("agent_address"),
            domain: r.get("domain"),
            public_key: r.get("public_key"),
            method: r.get("method"),
            status: r.get("status"),
        })
        .collect())
}

pub async fn update_verified_timestamp(pool: &AnyPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE domain_verifications SET verified_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn downgrade(pool: &AnyPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE domain_verifications SET status = 'expired' WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
