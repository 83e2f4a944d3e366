//! Inbound federation request handling: verify the sending relay's
//! signature against its known public key, enforce the replay window, and
//! hand the contained envelope to the routing core as if it arrived from a
//! locally-authenticated sender.

use chrono::{DateTime, Utc};
use relay_protocol::canonical::canonicalize;
use relay_protocol::keys::deserialize_verify_key;
use relay_protocol::sign::verify_signature;
use serde_json::Value;
use sqlx::AnyPool;

use crate::db::federation;

#[derive(Debug, PartialEq, Eq)]
pub enum InboundRejection {
    UnknownPeer,
    BadSignature,
    Stale,
    Malformed,
}

/// Verify an inbound federation request body `{envelope, origin_relay,
/// signature}`. Returns the envelope `Value` on success.
pub async fn verify_inbound(
    pool: &AnyPool,
    body: &Value,
    timestamp_max_age_secs: i64,
) -> Result<Value, InboundRejection> {
    let origin_relay = body
        .get("origin_relay")
        .and_then(Value::as_str)
        .ok_or(InboundRejection::Malformed)?;
    let signature = body
        .get("signature")
        .and_then(Value::as_str)
        .ok_or(InboundRejection::Malformed)?;
    let envelope = body.get("envelope").ok_or(InboundRejection::Malformed)?;

    let peer = federation::get_peer(pool, origin_relay)
        .await
        .map_err(|_| InboundRejection::UnknownPeer)?
        .ok_or(InboundRejection::UnknownPeer)?;
    let public_key_b64 = peer.public_key.ok_or(InboundRejection::UnknownPeer)?;
    let verify_key = deserialize_verify_key(&public_key_b64).map_err(|_| InboundRejection::UnknownPeer)?;

    let mut unsigned = body.clone();
    if let Some(obj) = unsigned.as_object_mut() {
        obj.remove("signature");
    }
    let canonical = canonicalize(&unsigned);
    verify_signature(&canonical, signature, &verify_key).map_err(|_| InboundRejection::BadSignature)?;

    let timestamp = envelope
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(InboundRejection::Malformed)?;
    let sent_at: DateTime<Utc> = timestamp
        .parse()
        .map_err(|_| InboundRejection::Malformed)?;
    let age = Utc::now().signed_duration_since(sent_at).num_seconds();
    if age > timestamp_max_age_secs {
        return Err(InboundRejection::Stale);
    }

    Ok(envelope.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::AnyPool;

    async fn test_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        crate::db::schema::create_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn rejects_malformed_body_missing_fields() {
        let pool = test_pool().await;
        let result = verify_inbound(&pool, &json!({}), 300).await;
        assert_eq!(result.unwrap_err(), InboundRejection::Malformed);
    }

    #[tokio::test]
    async fn rejects_envelope_from_unknown_peer() {
        let pool = test_pool().await;
        let body = json!({
            "origin_relay": "stranger.example",
            "signature": "sig",
            "envelope": {"timestamp": Utc::now().to_rfc3339()},
        });
        let result = verify_inbound(&pool, &body, 300).await;
        assert_eq!(result.unwrap_err(), InboundRejection::UnknownPeer);
    }
}
