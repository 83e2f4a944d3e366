//! Reputation scoring for relay agents. Score (0-100) determines tier and
//! per-sender rate limit:
//!
//! - full (>=80): 60 msg/min
//! - reduced (>=50): 30 msg/min
//! - throttled (>=20): 10 msg/min
//! - blocked (<20): 0 msg/min
//!
//! New agents default to score 30; DNS-verified agents start at 60.

use chrono::Utc;
use sqlx::{AnyPool, Row};

pub const TIER_FULL: i32 = 80;
pub const TIER_REDUCED: i32 = 50;
pub const TIER_THROTTLED: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Full,
    Reduced,
    Throttled,
    Blocked,
}

impl Tier {
    pub fn send_limit(&self) -> u32 {
        match self {
            Tier::Full => 60,
            Tier::Reduced => 30,
            Tier::Throttled => 10,
            Tier::Blocked => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Full => "full",
            Tier::Reduced => "reduced",
            Tier::Throttled => "throttled",
            Tier::Blocked => "blocked",
        }
    }
}

pub fn tier_for_score(score: i32) -> Tier {
    if score >= TIER_FULL {
        Tier::Full
    } else if score >= TIER_REDUCED {
        Tier::Reduced
    } else if score >= TIER_THROTTLED {
        Tier::Throttled
    } else {
        Tier::Blocked
    }
}

#[derive(Debug, Clone)]
pub struct ReputationInfo {
    pub address: String,
    pub score: i32,
    pub messages_sent: i64,
    pub messages_rejected: i64,
}

pub async fn init_score(
    pool: &AnyPool,
    address: &str,
    default_score: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO reputation (address, score) VALUES (?, ?)")
        .bind(address)
        .bind(default_score)
        .execute(pool)
        .await?;
    Ok(())
}

/// Atomically adjust score by `delta`, clamped to [0, 100]. Creates the row
/// with `default_score` first if absent. Returns the new score.
pub async fn update_score(
    pool: &AnyPool,
    address: &str,
    delta: i32,
    default_score: i32,
) -> Result<i32, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO reputation (address, score) VALUES (?, ?)")
        .bind(address)
        .bind(default_score)
        .execute(pool)
        .await?;
    sqlx::query(
        "UPDATE reputation SET score = MAX(0, MIN(100, score + ?)), updated_at = ? \
         WHERE address = ?",
    )
    .bind(delta)
    .bind(Utc::now().to_rfc3339())
    .bind(address)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT score FROM reputation WHERE address = ?")
        .bind(address)
        .fetch_one(pool)
        .await?;
    Ok(row.get("score"))
}

pub async fn set_score(pool: &AnyPool, address: &str, score: i32) -> Result<(), sqlx::Error> {
    let clamped = score.clamp(0, 100);
    sqlx::query(
        "INSERT INTO reputation (address, score, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT (address) DO UPDATE SET score = excluded.score, updated_at = excluded.updated_at",
    )
    .bind(address)
    .bind(clamped)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_score(pool: &AnyPool, address: &str, default_score: i32) -> Result<i32, sqlx::Error> {
    let row = sqlx::query("SELECT score FROM reputation WHERE address = ?")
        .bind(address)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("score")).unwrap_or(default_score))
}

pub async fn record_message_sent(pool: &AnyPool, address: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE reputation SET messages_sent = messages_sent + 1, updated_at = ? \
         WHERE address = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(address)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_message_rejected(pool: &AnyPool, address: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE reputation SET messages_rejected = messages_rejected + 1, updated_at = ? \
         WHERE address = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(address)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_info(
    pool: &AnyPool,
    address: &str,
) -> Result<Option<ReputationInfo>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT address, score, messages_sent, messages_rejected FROM reputation WHERE address = ?",
    )
    .bind(address)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| ReputationInfo {
        address: r.get("address"),
        score: r.get("score"),
        messages_sent: r.get("messages_sent"),
        messages_rejected: r.get("messages_rejected"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds_match_documented_bands() {
        assert_eq!(tier_for_score(85).send_limit(), 60);
        assert_eq!(tier_for_score(55).send_limit(), 30);
        assert_eq!(tier_for_score(25).send_limit(), 10);
        assert_eq!(tier_for_score(5).send_limit(), 0);
    }

    #[test]
    fn tier_boundaries_are_inclusive_of_the_lower_bound() {
        assert_eq!(tier_for_score(80).name(), "full");
        assert_eq!(tier_for_score(50).name(), "reduced");
        assert_eq!(tier_for_score(20).name(), "throttled");
        assert_eq!(tier_for_score(19).name(), "blocked");
    }
}
