//! Thin policy-layer wrapper around [`crate::db::reputation`] that applies
//! the configured default/verified starting scores and maps a score
//! straight to a per-sender send limit for the rate limiter.

use sqlx::AnyPool;

use crate::config::Config;
use crate::db::reputation::{self, Tier};

pub struct ReputationPolicy {
    default_score: i32,
    dns_verified_score: i32,
}

impl ReputationPolicy {
    pub fn new(config: &Config) -> Self {
        Self {
            default_score: config.reputation_default_score,
            dns_verified_score: config.reputation_dns_verified_score,
        }
    }

    pub async fn init_for_new_agent(
        &self,
        pool: &AnyPool,
        address: &str,
        dns_verified: bool,
    ) -> Result<(), sqlx::Error> {
        let score = if dns_verified {
            self.dns_verified_score
        } else {
            self.default_score
        };
        reputation::init_score(pool, address, score).await
    }

    pub async fn tier_for(&self, pool: &AnyPool, address: &str) -> Result<Tier, sqlx::Error> {
        let score = reputation::get_score(pool, address, self.default_score).await?;
        Ok(reputation::tier_for_score(score))
    }

    pub async fn send_limit_for(&self, pool: &AnyPool, address: &str) -> Result<u32, sqlx::Error> {
        Ok(self.tier_for(pool, address).await?.send_limit())
    }

    pub async fn on_message_accepted(&self, pool: &AnyPool, address: &str) -> Result<(), sqlx::Error> {
        reputation::record_message_sent(pool, address).await?;
        reputation::update_score(pool, address, 1, self.default_score).await?;
        Ok(())
    }

    pub async fn on_message_rejected(&self, pool: &AnyPool, address: &str) -> Result<(), sqlx::Error> {
        reputation::record_message_rejected(pool, address).await?;
        reputation::update_score(pool, address, -2, self.default_score).await?;
        Ok(())
    }

    /// Repeated abuse signals (webhook 4xx streaks, federation rejections)
    /// cost more than a single ordinary rejection.
    pub async fn on_abuse_signal(&self, pool: &AnyPool, address: &str) -> Result<(), sqlx::Error> {
        reputation::update_score(pool, address, -5, self.default_score).await?;
        Ok(())
    }
}
