//! In-memory mirror of the relay-level (domain-only) allow/block lists
//! persisted by [`crate::db::relay_blocklist`]. The federation analogue of
//! [`crate::policy::spam_filter`].

use std::collections::HashSet;
use std::sync::RwLock;

use sqlx::AnyPool;

use crate::db::relay_blocklist;

pub struct RelayAllowBlockList {
    blocked: RwLock<HashSet<String>>,
    allowed: RwLock<HashSet<String>>,
}

impl RelayAllowBlockList {
    pub fn empty() -> Self {
        Self {
            blocked: RwLock::new(HashSet::new()),
            allowed: RwLock::new(HashSet::new()),
        }
    }

    pub async fn load(pool: &AnyPool) -> Result<Self, sqlx::Error> {
        let list = Self::empty();
        list.refresh(pool).await?;
        Ok(list)
    }

    pub async fn refresh(&self, pool: &AnyPool) -> Result<(), sqlx::Error> {
        let blocked: HashSet<String> = relay_blocklist::list_blocked(pool)
            .await?
            .into_iter()
            .map(|e| e.domain)
            .collect();
        let allowed: HashSet<String> = relay_blocklist::list_allowed(pool)
            .await?
            .into_iter()
            .map(|e| e.domain)
            .collect();
        *self.blocked.write().unwrap() = blocked;
        *self.allowed.write().unwrap() = allowed;
        Ok(())
    }

    pub fn is_blocked(&self, domain: &str) -> bool {
        if self.allowed.read().unwrap().contains(domain) {
            return false;
        }
        self.blocked.read().unwrap().contains(domain)
    }
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
    async fn blocked_domain_is_reported_blocked() {
        let pool = test_pool().await;
        relay_blocklist::add_blocked(&pool, "evil-relay.com", None).await.unwrap();
        let list = RelayAllowBlockList::load(&pool).await.unwrap();
        assert!(list.is_blocked("evil-relay.com"));
        assert!(!list.is_blocked("good-relay.com"));
    }

    #[tokio::test]
    async fn allowlisted_domain_overrides_block() {
        let pool = test_pool().await;
        relay_blocklist::add_blocked(&pool, "evil-relay.com", None).await.unwrap();
        relay_blocklist::add_allowed(&pool, "evil-relay.com", None).await.unwrap();
        let list = RelayAllowBlockList::load(&pool).await.unwrap();
        assert!(!list.is_blocked("evil-relay.com"));
    }
}
