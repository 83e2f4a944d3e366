//! Webhook delivery worker: signs and POSTs accepted envelopes to a
//! recipient's registered webhook, retrying transient failures on a fixed
//! backoff schedule and tripping a per-agent circuit breaker on sustained
//! failure.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use sqlx::AnyPool;
use tracing::{info, warn};

use crate::db::agents::{self, AgentRow};
use crate::db::webhooks::{self, read_circuit_state};
use crate::policy::reputation::ReputationPolicy;
use crate::webhook::validator::validate_webhook_url;

type HmacSha256 = Hmac<Sha256>;

/// Seconds to wait before each retry attempt, indexed by attempt number.
/// `[0, 30s, 5m, 30m, 2h]`.
pub const RETRY_SCHEDULE_SECS: [u64; 5] = [0, 30, 300, 1800, 7200];

pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

fn sign_body(body: &str, token: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn circuit_is_open(agent: &AgentRow, now: chrono::DateTime<chrono::Utc>) -> bool {
    let state = read_circuit_state(&agent.metadata);
    match state.open_until {
        None => false,
        Some(open_until) => match chrono::DateTime::parse_from_rfc3339(&open_until) {
            Ok(until) => now < until.with_timezone(&chrono::Utc),
            Err(_) => false,
        },
    }
}

/// Attempt one delivery of `payload` to `agent`'s webhook. Returns `Ok(())`
/// on HTTP 2xx, or `Err(retry_after)` where `retry_after` is `None` for a
/// 4xx (fail fast, no retry) and `Some(seconds)` for a 5xx/timeout/network
/// error eligible for the next slot in [`RETRY_SCHEDULE_SECS`].
pub async fn attempt_delivery(
    http: &reqwest::Client,
    agent: &AgentRow,
    payload: &Value,
) -> Result<(), Option<&'static str>> {
    let Some(url) = &agent.webhook_url else {
        return Err(None);
    };

    if validate_webhook_url(url).await.is_err() {
        return Err(None);
    }

    let body = serde_json::to_string(payload).unwrap_or_default();
    let signature = sign_body(&body, &agent.token);

    let response = http
        .post(url)
        .header("X-UAM-Signature", signature)
        .header("Content-Type", "application/json")
        .timeout(DELIVERY_TIMEOUT)
        .body(body)
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) if resp.status().is_client_error() => Err(None),
        _ => Err(Some("transient")),
    }
}

/// Drive the full retry schedule for one delivery record, persisting
/// attempt state and tripping the circuit breaker after the schedule is
/// exhausted.
pub async fn deliver_with_retries(
    pool: &AnyPool,
    http: &reqwest::Client,
    reputation: &ReputationPolicy,
    delivery_id: i64,
    agent: &AgentRow,
    payload: &Value,
    circuit_cooldown_secs: i64,
) -> Result<(), sqlx::Error> {
    if circuit_is_open(agent, chrono::Utc::now()) {
        webhooks::mark_failed(pool, delivery_id, None, "circuit breaker open").await?;
        warn!(agent = %agent.address, "webhook delivery skipped, circuit open");
        return Ok(());
    }

    for (attempt_index, &delay) in RETRY_SCHEDULE_SECS.iter().enumerate() {
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        match attempt_delivery(http, agent, payload).await {
            Ok(()) => {
                webhooks::mark_delivered(pool, delivery_id).await?;
                info!(agent = %agent.address, "webhook delivered");
                return Ok(());
            }
            Err(None) => {
                webhooks::mark_failed(pool, delivery_id, None, "rejected (4xx or invalid url)").await?;
                let _ = reputation.on_abuse_signal(pool, &agent.address).await;
                warn!(agent = %agent.address, "webhook delivery failed fast, not retrying");
                return Ok(());
            }
            Err(Some(reason)) => {
                let next_delay = RETRY_SCHEDULE_SECS.get(attempt_index + 1).copied().unwrap_or(0);
                let next_attempt_at = (chrono::Utc::now() + chrono::Duration::seconds(next_delay as i64)).to_rfc3339();
                webhooks::mark_failed(pool, delivery_id, Some(&next_attempt_at), reason).await?;
            }
        }
    }

    let open_until = (chrono::Utc::now() + chrono::Duration::seconds(circuit_cooldown_secs)).to_rfc3339();
    let patch = json!({"webhook_circuit": {"failure_streak": 1, "open_until": open_until}});
    agents::patch_metadata(pool, &agent.address, &patch).await?;
    let _ = reputation.on_abuse_signal(pool, &agent.address).await;
    warn!(agent = %agent.address, "webhook retry schedule exhausted, circuit opened");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_independently_computed_hmac() {
        let body = r#"{"hello":"world"}"#;
        let token = "bobs-bearer-token";
        let sig = sign_body(body, token);

        let mut mac = HmacSha256::new_from_slice(token.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert_eq!(sig, expected);
    }

    #[test]
    fn signature_changes_with_the_token() {
        let body = "payload";
        assert_ne!(sign_body(body, "token-a"), sign_body(body, "token-b"));
    }

    fn test_agent(metadata: Value) -> AgentRow {
        AgentRow {
            address: "bob::relay.test".to_string(),
            public_key: "unused".to_string(),
            token: "unused".to_string(),
            webhook_url: None,
            verified_domain: None,
            metadata,
        }
    }

    #[test]
    fn circuit_with_no_open_until_is_closed() {
        let agent = test_agent(json!({}));
        assert!(!circuit_is_open(&agent, chrono::Utc::now()));
    }

    #[test]
    fn circuit_open_until_a_future_timestamp_is_open() {
        let future = (chrono::Utc::now() + chrono::Duration::seconds(60)).to_rfc3339();
        let agent = test_agent(json!({"webhook_circuit": {"open_until": future}}));
        assert!(circuit_is_open(&agent, chrono::Utc::now()));
    }

    #[test]
    fn circuit_open_until_a_past_timestamp_is_closed() {
        let past = (chrono::Utc::now() - chrono::Duration::seconds(60)).to_rfc3339();
        let agent = test_agent(json!({"webhook_circuit": {"open_until": past}}));
        assert!(!circuit_is_open(&agent, chrono::Utc::now()));
    }
}
