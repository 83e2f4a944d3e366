//! Relay-side domain ownership verification. The relay never trusts a
//! client's claim that it owns a domain; it performs its own DNS TXT lookup
//! (falling back to an HTTPS `.well-known` document) before granting Tier 2
//! trust.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use relay_protocol::parse_address;
use serde::Deserialize;
use sqlx::AnyPool;
use tracing::{info, warn};

use crate::db::{domain_verification, reputation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationMethod {
    Dns,
    Https,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::Dns => "dns",
            VerificationMethod::Https => "https",
        }
    }
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub success: bool,
    pub method: Option<VerificationMethod>,
    pub detail: String,
}

/// Parses a `_uam.<domain>` TXT record value into lowercase tag/value pairs.
/// Format: `v=uam1; key=ed25519:<base64>; relay=https://...`.
pub fn parse_uam_txt(txt_value: &str) -> std::collections::HashMap<String, String> {
    let mut tags = std::collections::HashMap::new();
    for part in txt_value.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((tag, value)) = part.split_once('=') {
            tags.insert(tag.trim().to_lowercase(), value.trim().to_string());
        }
    }
    tags
}

pub fn extract_public_key(tags: &std::collections::HashMap<String, String>) -> Option<String> {
    let key_value = tags.get("key")?;
    key_value.strip_prefix("ed25519:").map(String::from)
}

fn normalize_key(key: &str) -> &str {
    key.strip_prefix("ed25519:").unwrap_or(key)
}

/// Returns `true` only if `hostname` resolves exclusively to public,
/// non-loopback, non-link-local addresses. Fails closed: any DNS error or
/// empty result set is treated as unsafe.
pub async fn is_public_ip(hostname: &str) -> bool {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let response = match resolver.lookup_ip(hostname).await {
        Ok(response) => response,
        Err(_) => return false,
    };

    let addrs: Vec<IpAddr> = response.iter().collect();
    if addrs.is_empty() {
        return false;
    }

    addrs.iter().all(|addr| is_publicly_routable(*addr))
}

fn is_publicly_routable(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !(v4.is_private() || v4.is_loopback() || v4.is_link_local()),
        IpAddr::V6(v6) => !(v6.is_loopback() || is_unique_local_v6(v6) || v6.is_unicast_link_local()),
    }
}

fn is_unique_local_v6(addr: std::net::Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

#[derive(Deserialize)]
struct WellKnownDocument {
    v: String,
    #[serde(default)]
    agents: std::collections::HashMap<String, WellKnownAgent>,
}

#[derive(Deserialize)]
struct WellKnownAgent {
    key: String,
}

pub async fn verify_domain_ownership(
    http: &reqwest::Client,
    domain: &str,
    expected_public_key: &str,
    agent_address: &str,
) -> VerificationOutcome {
    let expected = normalize_key(expected_public_key);
    let Ok(parsed) = parse_address(agent_address) else {
        return VerificationOutcome {
            success: false,
            method: None,
            detail: "invalid agent address".to_string(),
        };
    };

    if let Some(outcome) = try_dns(domain, expected).await {
        return outcome;
    }

    if !is_public_ip(domain).await {
        warn!(%domain, "SSRF check failed, skipping HTTPS fallback");
        return VerificationOutcome {
            success: false,
            method: None,
            detail: "No valid verification found at DNS TXT or HTTPS .well-known".to_string(),
        };
    }

    let url = format!("https://{domain}/.well-known/uam.json");
    let response = match http.get(&url).timeout(Duration::from_secs(10)).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        _ => {
            return VerificationOutcome {
                success: false,
                method: None,
                detail: "No valid verification found at DNS TXT or HTTPS .well-known".to_string(),
            }
        }
    };

    let doc: WellKnownDocument = match response.json().await {
        Ok(doc) => doc,
        Err(_) => {
            return VerificationOutcome {
                success: false,
                method: None,
                detail: "HTTPS .well-known/uam.json returned invalid JSON".to_string(),
            }
        }
    };

    if doc.v != "uam1" {
        return VerificationOutcome {
            success: false,
            method: None,
            detail: "HTTPS .well-known/uam.json missing v=uam1".to_string(),
        };
    }

    let Some(agent_entry) = doc.agents.get(&parsed.agent) else {
        return VerificationOutcome {
            success: false,
            method: None,
            detail: format!("agent '{}' not found in .well-known/uam.json", parsed.agent),
        };
    };

    if normalize_key(&agent_entry.key) == expected {
        VerificationOutcome {
            success: true,
            method: Some(VerificationMethod::Https),
            detail: "HTTPS .well-known verification successful".to_string(),
        }
    } else {
        VerificationOutcome {
            success: false,
            method: Some(VerificationMethod::Https),
            detail: "HTTPS .well-known found but public key does not match".to_string(),
        }
    }
}

async fn try_dns(domain: &str, expected: &str) -> Option<VerificationOutcome> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let name = format!("_uam.{domain}");
    let lookup = resolver.txt_lookup(name).await.ok()?;

    for record in lookup.iter() {
        let txt_value: String = record
            .txt_data()
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes))
            .collect();
        let tags = parse_uam_txt(&txt_value);
        if tags.get("v").map(String::as_str) != Some("uam1") {
            continue;
        }
        let Some(found_key) = extract_public_key(&tags) else {
            continue;
        };
        return Some(if normalize_key(&found_key) == expected {
            VerificationOutcome {
                success: true,
                method: Some(VerificationMethod::Dns),
                detail: "DNS TXT verification successful".to_string(),
            }
        } else {
            VerificationOutcome {
                success: false,
                method: Some(VerificationMethod::Dns),
                detail: "DNS TXT record found but public key does not match".to_string(),
            }
        });
    }
    None
}

/// Background sweep (run hourly) that re-checks verified domains past their
/// TTL and downgrades anyone who no longer proves ownership back to the
/// default reputation tier.
pub async fn reverification_loop(pool: Arc<AnyPool>, http: reqwest::Client, ttl_hours: i64, default_score: i32) {
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;

        let expired = match domain_verification::get_expired(&pool, ttl_hours).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "failed to load expired domain verifications");
                continue;
            }
        };

        for entry in expired {
            let outcome = verify_domain_ownership(
                &http,
                &entry.domain,
                &entry.public_key,
                &entry.agent_address,
            )
            .await;

            if outcome.success {
                let _ = domain_verification::update_verified_timestamp(&pool, entry.id).await;
                info!(agent = %entry.agent_address, domain = %entry.domain, "re-verification succeeded");
            } else {
                let _ = domain_verification::downgrade(&pool, entry.id).await;
                let _ = reputation::set_score(&pool, &entry.agent_address, default_score).await;
                warn!(agent = %entry.agent_address, domain = %entry.domain, detail = %outcome.detail, "re-verification failed, downgraded to tier 1");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_value_pairs_case_insensitively() {
        let tags = parse_uam_txt("V=uam1; KEY=ed25519:abc123; relay=https://relay.test");
        assert_eq!(tags.get("v").unwrap(), "uam1");
        assert_eq!(tags.get("key").unwrap(), "ed25519:abc123");
        assert_eq!(tags.get("relay").unwrap(), "https://relay.test");
    }

    #[test]
    fn extracts_key_and_strips_prefix() {
        let tags = parse_uam_txt("v=uam1; key=ed25519:abc123");
        assert_eq!(extract_public_key(&tags).unwrap(), "abc123");
    }

    #[test]
    fn missing_key_prefix_yields_none() {
        let tags = parse_uam_txt("v=uam1; key=abc123");
        assert!(extract_public_key(&tags).is_none());
    }

    #[test]
    fn private_and_loopback_addresses_are_rejected() {
        assert!(!is_publicly_routable("10.0.0.5".parse().unwrap()));
        assert!(!is_publicly_routable("127.0.0.1".parse().unwrap()));
        assert!(!is_publicly_routable("169.254.1.1".parse().unwrap()));
        assert!(is_publicly_routable("8.8.8.8".parse().unwrap()));
    }
}
