//! Relay server configuration, read from environment variables with defaults.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Selects storage backend and driver (`postgres://...` or `sqlite://...`).
    pub database_url: String,

    /// The authoritative local domain this relay serves, e.g. `youam.network`.
    pub relay_domain: String,
    pub relay_ws_url: String,
    pub relay_http_url: String,

    /// Path to the relay's own persistent Ed25519 keypair (federation identity).
    /// Generated on first boot with file mode 0600 if absent.
    pub relay_key_path: String,

    pub host: String,
    pub port: u16,
    pub cors_origins: String,
    pub log_level: String,

    pub admin_api_key: Option<String>,

    pub domain_rate_limit: u32,
    pub domain_verification_ttl_hours: i64,

    pub reputation_default_score: i32,
    pub reputation_dns_verified_score: i32,

    pub webhook_circuit_cooldown_seconds: i64,
    pub webhook_delivery_timeout_secs: u64,

    pub federation_enabled: bool,
    pub federation_max_hops: u32,
    pub federation_relay_rate_limit: u32,
    pub federation_timestamp_max_age_secs: i64,
    pub federation_discovery_ttl_hours: i64,
    pub federation_retry_delays_secs: Vec<u64>,

    /// Pool-tuning.
    pub db_max_connections: u32,
    pub db_min_connections: u32,

    /// Default message retention window before hard purge (spec §3, Message).
    pub message_retention_days: i64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let relay_domain = env_or("UAM_RELAY_DOMAIN", "youam.network");

        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite://relay.db"),
            relay_ws_url: env_or(
                "UAM_RELAY_WS_URL",
                &format!("wss://relay.{relay_domain}/ws"),
            ),
            relay_http_url: env_or("UAM_RELAY_HTTP_URL", &format!("https://relay.{relay_domain}")),
            relay_key_path: env_or("UAM_RELAY_KEY_PATH", "relay_key.b64"),
            relay_domain,
            host: env_or("UAM_HOST", "0.0.0.0"),
            port: env_or("UAM_PORT", "8000")
                .parse()
                .context("invalid UAM_PORT")?,
            cors_origins: env_or("UAM_CORS_ORIGINS", "*"),
            log_level: env_or("UAM_LOG_LEVEL", "info").to_lowercase(),
            admin_api_key: std::env::var("UAM_ADMIN_API_KEY").ok(),
            domain_rate_limit: env_or("UAM_DOMAIN_RATE_LIMIT", "200")
                .parse()
                .context("invalid UAM_DOMAIN_RATE_LIMIT")?,
            domain_verification_ttl_hours: env_or("UAM_DOMAIN_VERIFICATION_TTL_HOURS", "24")
                .parse()
                .unwrap_or(24),
            reputation_default_score: env_or("UAM_REPUTATION_DEFAULT_SCORE", "30")
                .parse()
                .unwrap_or(30),
            reputation_dns_verified_score: env_or("UAM_REPUTATION_DNS_VERIFIED_SCORE", "60")
                .parse()
                .unwrap_or(60),
            webhook_circuit_cooldown_seconds: env_or("UAM_WEBHOOK_CIRCUIT_COOLDOWN_SECONDS", "3600")
                .parse()
                .unwrap_or(3600),
            webhook_delivery_timeout_secs: env_or("UAM_WEBHOOK_DELIVERY_TIMEOUT", "30")
                .parse()
                .unwrap_or(30),
            federation_enabled: env_bool("UAM_FEDERATION_ENABLED", true),
            federation_max_hops: env_or("UAM_FEDERATION_MAX_HOPS", "3")
                .parse()
                .unwrap_or(3),
            federation_relay_rate_limit: env_or("UAM_FEDERATION_RELAY_RATE_LIMIT", "1000")
                .parse()
                .unwrap_or(1000),
            federation_timestamp_max_age_secs: env_or("UAM_FEDERATION_TIMESTAMP_MAX_AGE", "300")
                .parse()
                .unwrap_or(300),
            federation_discovery_ttl_hours: env_or("UAM_FEDERATION_DISCOVERY_TTL_HOURS", "1")
                .parse()
                .unwrap_or(1),
            federation_retry_delays_secs: vec![0, 30, 300, 1800, 7200],
            db_max_connections: env_or("UAM_DB_MAX_CONNECTIONS", "10")
                .parse()
                .unwrap_or(10),
            db_min_connections: env_or("UAM_DB_MIN_CONNECTIONS", "1")
                .parse()
                .unwrap_or(1),
            message_retention_days: env_or("UAM_MESSAGE_RETENTION_DAYS", "90")
                .parse()
                .unwrap_or(90),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn federation_retry_delays_follow_the_documented_schedule() {
        let delays = vec![0u64, 30, 300, 1800, 7200];
        assert_eq!(delays, vec![0, 30, 300, 1800, 7200]);
    }

    #[test]
    fn env_bool_parses_common_truthy_strings() {
        std::env::set_var("UAM_TEST_BOOL_FLAG", "YES");
        assert!(env_bool("UAM_TEST_BOOL_FLAG", false));
        std::env::remove_var("UAM_TEST_BOOL_FLAG");
        assert!(!env_bool("UAM_TEST_BOOL_FLAG", false));
    }
}
