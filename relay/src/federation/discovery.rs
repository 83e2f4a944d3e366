//! Peer relay discovery via `https://{domain}/.well-known/uam-relay.json`,
//! cached with a TTL so every federated send doesn't re-fetch the document.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Deserialize;
use sqlx::AnyPool;

use crate::db::federation;
use crate::verification::is_public_ip;

#[derive(Debug, Deserialize, Clone)]
pub struct RelayDescriptor {
    pub domain: String,
    pub public_key: String,
    pub endpoint: String,
}

struct CacheEntry {
    descriptor: RelayDescriptor,
    fetched_at: Instant,
}

pub struct RelayDiscovery {
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl RelayDiscovery {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Resolve `domain` to its relay descriptor, preferring the persisted
    /// peer record, then the in-memory cache, then a live discovery fetch.
    pub async fn resolve(
        &self,
        pool: &AnyPool,
        http: &reqwest::Client,
        domain: &str,
    ) -> Result<RelayDescriptor, String> {
        if let Some(peer) = federation::get_peer(pool, domain)
            .await
            .map_err(|e| e.to_string())?
        {
            if let Some(public_key) = peer.public_key {
                return Ok(RelayDescriptor {
                    domain: domain.to_string(),
                    public_key,
                    endpoint: format!("https://{domain}/federation/inbound"),
                });
            }
        }

        if let Some(entry) = self.cache.read().unwrap().get(domain) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.descriptor.clone());
            }
        }

        let descriptor = self.fetch(http, domain).await?;
        federation::upsert_peer(pool, domain, &descriptor.public_key)
            .await
            .map_err(|e| e.to_string())?;
        self.cache.write().unwrap().insert(
            domain.to_string(),
            CacheEntry {
                descriptor: descriptor.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(descriptor)
    }

    async fn fetch(&self, http: &reqwest::Client, domain: &str) -> Result<RelayDescriptor, String> {
        if !is_public_ip(domain).await {
            return Err("SSRF check failed for relay discovery".to_string());
        }

        let url = format!("https://{domain}/.well-known/uam-relay.json");
        let response = http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("discovery fetch failed with status {}", response.status()));
        }

        response
            .json::<RelayDescriptor>()
            .await
            .map_err(|e| format!("malformed relay descriptor: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_expires_after_ttl() {
        let discovery = RelayDiscovery::new(Duration::from_millis(10));
        discovery.cache.write().unwrap().insert(
            "peer.example".to_string(),
            CacheEntry {
                descriptor: RelayDescriptor {
                    domain: "peer.example".to_string(),
                    public_key: "abc".to_string(),
                    endpoint: "https://peer.example/federation/inbound".to_string(),
                },
                fetched_at: Instant::now() - Duration::from_millis(50),
            },
        );
        let cache = discovery.cache.read().unwrap();
        let entry = cache.get("peer.example").unwrap();
        assert!(entry.fetched_at.elapsed() >= discovery.ttl);
    }
}
