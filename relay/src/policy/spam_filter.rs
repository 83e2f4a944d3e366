//! In-memory mirror of the agent-level allow/block lists persisted by
//! [`crate::db::spam`]. Held as two small sets so the hot path (checking
//! every inbound envelope) never touches the database.

use std::collections::HashSet;
use std::sync::RwLock;

use sqlx::AnyPool;

use crate::db::spam;

#[derive(Default)]
struct Sets {
    exact: HashSet<String>,
    domains: HashSet<String>,
}

fn domain_of(address: &str) -> Option<&str> {
    address.split_once("::").map(|(_, domain)| domain)
}

fn split_patterns(entries: Vec<spam::ListEntry>) -> Sets {
    let mut sets = Sets::default();
    for entry in entries {
        match spam::classify_pattern(&entry.pattern) {
            Ok(spam::PatternKind::Exact(p)) => {
                sets.exact.insert(p);
            }
            Ok(spam::PatternKind::Domain(d)) => {
                sets.domains.insert(d);
            }
            Err(_) => {}
        }
    }
    sets
}

pub struct AllowBlockList {
    blocked: RwLock<Sets>,
    allowed: RwLock<Sets>,
}

impl AllowBlockList {
    pub fn empty() -> Self {
        Self {
            blocked: RwLock::new(Sets::default()),
            allowed: RwLock::new(Sets::default()),
        }
    }

    pub async fn load(pool: &AnyPool) -> Result<Self, sqlx::Error> {
        let list = Self::empty();
        list.refresh(pool).await?;
        Ok(list)
    }

    pub async fn refresh(&self, pool: &AnyPool) -> Result<(), sqlx::Error> {
        let blocked = split_patterns(spam::list_blocked(pool).await?);
        let allowed = split_patterns(spam::list_allowed(pool).await?);
        *self.blocked.write().unwrap() = blocked;
        *self.allowed.write().unwrap() = allowed;
        Ok(())
    }

    /// An explicit allow entry always wins over a block entry for the same
    /// address, matching the original's "allowlist overrides blocklist"
    /// precedence.
    pub fn is_blocked(&self, address: &str) -> bool {
        if self.matches(&self.allowed, address) {
            return false;
        }
        self.matches(&self.blocked, address)
    }

    fn matches(&self, sets: &RwLock<Sets>, address: &str) -> bool {
        let sets = sets.read().unwrap();
        if sets.exact.contains(address) {
            return true;
        }
        if let Some(domain) = domain_of(address) {
            if sets.domains.contains(domain) {
                return true;
            }
        }
        false
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
    async fn exact_pattern_blocks_only_that_address() {
        let pool = test_pool().await;
        spam::add_blocked(&pool, "spammer::evil.com", None).await.unwrap();
        let list = AllowBlockList::load(&pool).await.unwrap();
        assert!(list.is_blocked("spammer::evil.com"));
        assert!(!list.is_blocked("other::evil.com"));
    }

    #[tokio::test]
    async fn wildcard_pattern_blocks_entire_domain() {
        let pool = test_pool().await;
        spam::add_blocked(&pool, "*::evil.com", None).await.unwrap();
        let list = AllowBlockList::load(&pool).await.unwrap();
        assert!(list.is_blocked("anyone::evil.com"));
        assert!(!list.is_blocked("anyone::good.com"));
    }

    #[tokio::test]
    async fn allowlist_entry_overrides_a_blocking_wildcard() {
        let pool = test_pool().await;
        spam::add_blocked(&pool, "*::evil.com", None).await.unwrap();
        spam::add_allowed(&pool, "trusted::evil.com", None).await.unwrap();
        let list = AllowBlockList::load(&pool).await.unwrap();
        assert!(!list.is_blocked("trusted::evil.com"));
        assert!(list.is_blocked("anyone-else::evil.com"));
    }
}
