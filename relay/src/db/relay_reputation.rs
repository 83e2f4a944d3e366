//! Reputation scoring for peer relay domains, the federation analogue of
//! [`crate::db::reputation`]. New relays default to score 50 (neutral trust,
//! higher than an agent's 30 since relays are more accountable
//! infrastructure).

use chrono::Utc;
use sqlx::{AnyPool, Row};

const TIER_FULL: i32 = 80;
const TIER_NORMAL: i32 = 50;
const TIER_THROTTLED: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTier {
    Full,
    Normal,
    Throttled,
    Blocked,
}

impl RelayTier {
    pub fn rate_limit(&self, base_rate_limit: u32) -> u32 {
        match self {
            RelayTier::Full => base_rate_limit,
            RelayTier::Normal => base_rate_limit / 2,
            RelayTier::Throttled => base_rate_limit / 10,
            RelayTier::Blocked => 0,
        }
    }
}

pub fn tier_for_score(score: i32) -> RelayTier {
    if score >= TIER_FULL {
        RelayTier::Full
    } else if score >= TIER_NORMAL {
        RelayTier::Normal
    } else if score >= TIER_THROTTLED {
        RelayTier::Throttled
    } else {
        RelayTier::Blocked
    }
}

pub async fn get_score(pool: &AnyPool, domain: &str) -> Result<i32, sqlx::Error> {
    let row = sqlx::query("SELECT score FROM relay_reputation WHERE domain = ?")
        .bind(domain)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("score")).unwrap_or(50))
}

/// Record a successful federation delivery from `domain`: +1 score
/// (capped at 100), increments the forwarded counter.
pub async fn record_success(pool: &AnyPool, domain: &str) -> Result<i32, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO relay_reputation (domain) VALUES (?)")
        .bind(domain)
        .execute(pool)
        .await?;
    sqlx::query(
        "UPDATE relay_reputation SET messages_forwarded = messages_forwarded + 1, \
         score = MIN(100, score + 1), last_success = ?, \
         updated_at = ? WHERE domain = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .bind(domain)
    .execute(pool)
    .await?;
    get_score(pool, domain).await
}

/// Record a failed/rejected federation attempt from `domain`: -5 score
/// (floored at 0), increments the rejected counter.
pub async fn record_failure(pool: &AnyPool, domain: &str) -> Result<i32, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO relay_reputation (domain) VALUES (?)")
        .bind(domain)
        .execute(pool)
        .await?;
    sqlx::query(
        "UPDATE relay_reputation SET messages_rejected = messages_rejected + 1, \
         score = MAX(0, score - 5), last_failure = ?, \
         updated_at = ? WHERE domain = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .bind(domain)
    .execute(pool)
    .await?;
    get_score(pool, domain).await
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
    async fn new_relay_defaults_to_neutral_score() {
        let pool = test_pool().await;
        assert_eq!(get_score(&pool, "peer.example").await.unwrap(), 50);
        assert_eq!(tier_for_score(50), RelayTier::Normal);
    }

    #[tokio::test]
    async fn success_and_failure_move_score_in_opposite_directions() {
        let pool = test_pool().await;
        let after_success = record_success(&pool, "peer.example").await.unwrap();
        assert_eq!(after_success, 51);

        let after_failure = record_failure(&pool, "peer.example").await.unwrap();
        assert_eq!(after_failure, 46);
    }

    #[test]
    fn full_tier_gets_the_unscaled_base_rate() {
        assert_eq!(RelayTier::Full.rate_limit(1000), 1000);
        assert_eq!(RelayTier::Normal.rate_limit(1000), 500);
        assert_eq!(RelayTier::Throttled.rate_limit(1000), 100);
        assert_eq!(RelayTier::Blocked.rate_limit(1000), 0);
    }
}
