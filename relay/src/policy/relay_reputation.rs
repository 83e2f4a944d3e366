//! Policy-layer wrapper around [`crate::db::relay_reputation`]. Converts a
//! peer domain's score into the rate limit applied to federation traffic
//! from that domain, scaled off `federation_relay_rate_limit`.

use sqlx::AnyPool;

use crate::config::Config;
use crate::db::relay_reputation::{self, RelayTier};

pub struct RelayReputationPolicy {
    base_rate_limit: u32,
}

impl RelayReputationPolicy {
    pub fn new(config: &Config) -> Self {
        Self {
            base_rate_limit: config.federation_relay_rate_limit,
        }
    }

    pub async fn tier_for(&self, pool: &AnyPool, domain: &str) -> Result<RelayTier, sqlx::Error> {
        let score = relay_reputation::get_score(pool, domain).await?;
        Ok(relay_reputation::tier_for_score(score))
    }

    pub async fn rate_limit_for(&self, pool: &AnyPool, domain: &str) -> Result<u32, sqlx::Error> {
        Ok(self.tier_for(pool, domain).await?.rate_limit(self.base_rate_limit))
    }

    pub async fn is_blocked(&self, pool: &AnyPool, domain: &str) -> Result<bool, sqlx::Error> {
        Ok(self.tier_for(pool, domain).await? == RelayTier::Blocked)
    }
}
