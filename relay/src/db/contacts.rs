//! Recipient-side trust records. Trust only monotonically upgrades
//! (unknown -> provisional -> pinned -> verified) except by explicit removal.

use chrono::Utc;
use serde_json::Value;
use sqlx::{AnyPool, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustState {
    Unknown,
    Provisional,
    Pinned,
    Verified,
}

impl TrustState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustState::Unknown => "unknown",
            TrustState::Provisional => "provisional",
            TrustState::Pinned => "pinned",
            TrustState::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "provisional" => TrustState::Provisional,
            "pinned" => TrustState::Pinned,
            "verified" => TrustState::Verified,
            _ => TrustState::Unknown,
        }
    }
}

pub async fn get_trust_state(
    pool: &AnyPool,
    owner: &str,
    contact_address: &str,
) -> Result<TrustState, sqlx::Error> {
    let row = sqlx::query(
        "SELECT trust_state FROM contacts WHERE owner = ? AND contact_address = ?",
    )
    .bind(owner)
    .bind(contact_address)
    .fetch_optional(pool)
    .await?;

    Ok(row
        .map(|r| TrustState::parse(r.get::<&str, _>("trust_state")))
        .unwrap_or(TrustState::Unknown))
}

/// Upgrade trust for `contact_address`, refusing to downgrade an existing
/// higher trust state.
pub async fn upgrade_trust(
    pool: &AnyPool,
    owner: &str,
    contact_address: &str,
    new_state: TrustState,
    contact_card: Option<&Value>,
) -> Result<(), sqlx::Error> {
    let current = get_trust_state(pool, owner, contact_address).await?;
    if new_state <= current {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO contacts (owner, contact_address, trust_state, contact_card, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (owner, contact_address) DO UPDATE SET \
         trust_state = excluded.trust_state, contact_card = excluded.contact_card, \
         updated_at = excluded.updated_at",
    )
    .bind(owner)
    .bind(contact_address)
    .bind(new_state.as_str())
    .bind(contact_card.map(|c| c.to_string()))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_contact(
    pool: &AnyPool,
    owner: &str,
    contact_address: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE owner = ? AND contact_address = ?")
        .bind(owner)
        .bind(contact_address)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;
    use sqlx::AnyPool;

    async fn test_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn trust_upgrades_monotonically() {
        let pool = test_pool().await;
        upgrade_trust(&pool, "alice", "bob::relay.test", TrustState::Provisional, None)
            .await
            .unwrap();
        upgrade_trust(&pool, "alice", "bob::relay.test", TrustState::Unknown, None)
            .await
            .unwrap();

        let state = get_trust_state(&pool, "alice", "bob::relay.test").await.unwrap();
        assert_eq!(state, TrustState::Provisional);

        upgrade_trust(&pool, "alice", "bob::relay.test", TrustState::Verified, None)
            .await
            .unwrap();
        let state = get_trust_state(&pool, "alice", "bob::relay.test").await.unwrap();
        assert_eq!(state, TrustState::Verified);
    }
}
