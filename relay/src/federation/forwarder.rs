//! Outbound federation worker. Drains the durable outbox
//! ([`crate::db::federation`]), signs each request with the relay's own
//! Ed25519 key, and POSTs it to the peer's federation endpoint — retrying
//! on the same backoff schedule as webhook delivery before dead-lettering.

use ed25519_dalek::SigningKey;
use relay_protocol::canonical::canonicalize;
use relay_protocol::sign::sign_message;
use serde_json::{json, Value};
use sqlx::AnyPool;
use tracing::{info, warn};

use crate::db::federation::{self, OutboxRow};
use crate::db::relay_reputation;
use crate::federation::discovery::RelayDiscovery;

pub const RETRY_SCHEDULE_SECS: [u64; 5] = [0, 30, 300, 1800, 7200];

/// Build the outbound request body: the envelope plus a relay-level
/// signature over its canonical form, so the receiving relay can verify it
/// came from the relay it already trusts, not merely from whoever sent the
/// TCP connection. `hop_count` is the number of relay hops the envelope has
/// taken including this one, so the receiving relay can enforce its own
/// hop limit on ingress.
pub fn build_signed_request(
    envelope: &Value,
    signing_key: &SigningKey,
    relay_domain: &str,
    hop_count: i32,
) -> Value {
    let mut body = json!({
        "envelope": envelope,
        "origin_relay": relay_domain,
        "hop_count": hop_count,
    });
    let canonical = canonicalize(&body);
    let signature = sign_message(&canonical, signing_key);
    body["signature"] = Value::String(signature);
    body
}

/// Process one entry from the outbox: attempt delivery, and either mark it
/// delivered or reschedule/dead-letter it based on the outcome. `max_hops`
/// comes from [`crate::config::Config::federation_max_hops`]; the same
/// limit was already checked before the entry was enqueued, this is a
/// second check in case the config changed since.
pub async fn process_entry(
    pool: &AnyPool,
    http: &reqwest::Client,
    discovery: &RelayDiscovery,
    signing_key: &SigningKey,
    relay_domain: &str,
    max_hops: i32,
    entry: OutboxRow,
) -> Result<(), sqlx::Error> {
    if entry.hop_count > max_hops {
        warn!(target = %entry.target_domain, hops = entry.hop_count, "dropping envelope, max hops exceeded");
        federation::reschedule(pool, entry.id, None).await?;
        return Ok(());
    }

    let envelope: Value = match serde_json::from_str(&entry.envelope_json) {
        Ok(value) => value,
        Err(_) => {
            federation::reschedule(pool, entry.id, None).await?;
            return Ok(());
        }
    };

    let peer = match discovery.resolve(pool, http, &entry.target_domain).await {
        Ok(peer) => peer,
        Err(err) => {
            warn!(target = %entry.target_domain, error = %err, "relay discovery failed");
            return reschedule_for_retry(pool, &entry).await;
        }
    };

    let body = build_signed_request(&envelope, signing_key, relay_domain, entry.hop_count);

    let response = http
        .post(&peer.endpoint)
        .json(&body)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => {
            federation::mark_delivered(pool, entry.id).await?;
            let _ = relay_reputation::record_success(pool, &entry.target_domain).await;
            info!(target = %entry.target_domain, "federation delivery succeeded");
            Ok(())
        }
        Ok(resp) if resp.status().is_client_error() => {
            let _ = relay_reputation::record_failure(pool, &entry.target_domain).await;
            federation::reschedule(pool, entry.id, None).await
        }
        _ => reschedule_for_retry(pool, &entry).await,
    }
}

async fn reschedule_for_retry(pool: &AnyPool, entry: &OutboxRow) -> Result<(), sqlx::Error> {
    let attempt = entry.attempt as usize;
    if attempt >= RETRY_SCHEDULE_SECS.len() {
        warn!(target = %entry.target_domain, "federation retry schedule exhausted, dead-lettering");
        let _ = relay_reputation::record_failure(pool, &entry.target_domain).await;
        return federation::reschedule(pool, entry.id, None).await;
    }
    let delay = RETRY_SCHEDULE_SECS[attempt];
    let next_attempt_at = (chrono::Utc::now() + chrono::Duration::seconds(delay as i64)).to_rfc3339();
    federation::reschedule(pool, entry.id, Some(&next_attempt_at)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn signed_request_signature_verifies_against_the_relays_own_key() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let envelope = json!({"message_id": "abc"});
        let body = build_signed_request(&envelope, &signing_key, "relay.test", 1);

        let signature = body["signature"].as_str().unwrap().to_string();
        let mut unsigned = body.clone();
        unsigned.as_object_mut().unwrap().remove("signature");
        let canonical = canonicalize(&unsigned);

        relay_protocol::sign::verify_signature(&canonical, &signature, &signing_key.verifying_key())
            .expect("signature should verify");
    }

    #[test]
    fn signed_request_carries_the_hop_count_for_the_receiving_relays_ingress_check() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let envelope = json!({"message_id": "abc"});
        let body = build_signed_request(&envelope, &signing_key, "relay.test", 2);
        assert_eq!(body["hop_count"], 2);
    }

    #[tokio::test]
    async fn hop_count_over_max_is_rejected_before_any_network_call() {
        use crate::db::schema::create_tables;

        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        create_tables(&pool).await.unwrap();

        let entry_id = federation::enqueue(&pool, "peer.example", r#"{"message_id":"abc"}"#, 4)
            .await
            .unwrap();
        let entry = OutboxRow {
            id: entry_id,
            target_domain: "peer.example".to_string(),
            envelope_json: r#"{"message_id":"abc"}"#.to_string(),
            hop_count: 4,
            attempt: 0,
            next_attempt_at: None,
        };

        let signing_key = SigningKey::generate(&mut OsRng);
        let http = reqwest::Client::new();
        let discovery = RelayDiscovery::new(std::time::Duration::from_secs(3600));

        process_entry(&pool, &http, &discovery, &signing_key, "relay.test", 3, entry)
            .await
            .unwrap();

        let due = federation::due_for_retry(&pool, 10).await.unwrap();
        assert!(due.is_empty(), "over-the-limit entry should be dead-lettered, not retried");
    }
}
