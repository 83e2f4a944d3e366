//! The Accept → Persist → Forward state machine that every inbound
//! envelope passes through: verify, filter, dedup, then push to an online
//! recipient, queue for an offline one, or hand off to federation.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::AnyPool;
use tracing::info;

use crate::config::Config;
use crate::connections::ConnectionManager;
use crate::db::contacts::TrustState;
use crate::db::{agents, contacts, federation, handshakes, messages, webhooks};
use crate::policy::rate_limit::SlidingWindowCounter;
use crate::policy::relay_reputation::RelayReputationPolicy;
use crate::policy::reputation::ReputationPolicy;
use crate::policy::spam_filter::AllowBlockList;
use crate::webhook::delivery::deliver_with_retries;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Queued,
    Federated,
    Rejected(&'static str),
}

pub struct RoutingCore {
    pool: Arc<AnyPool>,
    connections: Arc<ConnectionManager>,
    spam_filter: Arc<AllowBlockList>,
    reputation: Arc<ReputationPolicy>,
    relay_reputation: Arc<RelayReputationPolicy>,
    sender_limiter: SlidingWindowCounter,
    recipient_limiter: SlidingWindowCounter,
    relay_domain: String,
    http: reqwest::Client,
    webhook_circuit_cooldown_secs: i64,
    federation_max_hops: i32,
}

impl RoutingCore {
    pub fn new(
        pool: Arc<AnyPool>,
        connections: Arc<ConnectionManager>,
        spam_filter: Arc<AllowBlockList>,
        reputation: Arc<ReputationPolicy>,
        relay_reputation: Arc<RelayReputationPolicy>,
        http: reqwest::Client,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            connections,
            spam_filter,
            reputation,
            relay_reputation,
            sender_limiter: SlidingWindowCounter::new(60, std::time::Duration::from_secs(60)),
            recipient_limiter: SlidingWindowCounter::new(100, std::time::Duration::from_secs(60)),
            relay_domain: config.relay_domain.clone(),
            http,
            webhook_circuit_cooldown_secs: config.webhook_circuit_cooldown_seconds,
            federation_max_hops: config.federation_max_hops as i32,
        }
    }

    /// Route one accepted, signature-verified envelope. `envelope` is the
    /// full wire JSON (already verified by the caller); `from`/`to` are its
    /// parsed addresses. `hop_count` is the number of relay hops the
    /// envelope has already crossed: `0` for an envelope submitted directly
    /// by a locally connected agent, or the value the peer relay declared
    /// for one arriving over federation.
    pub async fn route(&self, envelope: Value, from: &str, to: &str, message_id: &str, hop_count: i32) -> Outcome {
        if self.spam_filter.is_blocked(from) {
            return Outcome::Rejected("blocked");
        }

        let send_limit = match self.reputation.send_limit_for(&self.pool, from).await {
            Ok(limit) => limit,
            Err(_) => 0,
        };
        if send_limit == 0 || !self.sender_limiter.check(from, Some(send_limit)) {
            let _ = self.reputation.on_message_rejected(&self.pool, from).await;
            return Outcome::Rejected("rate_limited");
        }
        if !self.recipient_limiter.check(to, Some(100)) {
            return Outcome::Rejected("rate_limited");
        }

        match messages::record_message_id(&self.pool, message_id).await {
            Ok(true) => {}
            Ok(false) => return Outcome::Rejected("duplicate"),
            Err(_) => return Outcome::Rejected("internal_error"),
        }

        self.record_handshake_side_effects(&envelope, from, to).await;

        let outcome = if is_local(to, &self.relay_domain) {
            self.route_local(envelope, from, to, message_id).await
        } else {
            self.route_remote(envelope, to, hop_count).await
        };

        let _ = self.reputation.on_message_accepted(&self.pool, from).await;
        outcome
    }

    /// Handshake envelopes additionally mutate the handshake/contact
    /// bookkeeping tables (spec's Handshake/Contact data model). The relay
    /// never decrypts the payload, so the stored "contact card" is the
    /// envelope itself; only the recipient's own client can read it.
    async fn record_handshake_side_effects(&self, envelope: &Value, from: &str, to: &str) {
        match envelope.get("type").and_then(Value::as_str) {
            Some("handshake.request") => {
                let _ = handshakes::create_handshake(&self.pool, from, to, envelope).await;
                let _ = contacts::upgrade_trust(&self.pool, to, from, TrustState::Provisional, Some(envelope)).await;
            }
            Some("handshake.accept") => {
                self.resolve_pending_handshake(to, from, true).await;
                let _ = contacts::upgrade_trust(&self.pool, to, from, TrustState::Pinned, Some(envelope)).await;
                let _ = contacts::upgrade_trust(&self.pool, from, to, TrustState::Pinned, Some(envelope)).await;
            }
            Some("handshake.deny") => {
                self.resolve_pending_handshake(to, from, false).await;
            }
            _ => {}
        }
    }

    /// The accept/deny envelope flows in the opposite direction of the
    /// original request, so `to` here is the original requester and `from`
    /// is the original recipient.
    async fn resolve_pending_handshake(&self, original_from: &str, original_to: &str, approved: bool) {
        let Ok(pending) = handshakes::get_pending(&self.pool, original_to).await else {
            return;
        };
        if let Some(row) = pending.into_iter().find(|h| h.from_address == original_from) {
            let _ = handshakes::resolve_handshake(&self.pool, row.id, approved).await;
        }
    }

    async fn route_local(&self, envelope: Value, from: &str, to: &str, message_id: &str) -> Outcome {
        if self.connections.is_online(to).await {
            if self.connections.send_to(to, envelope.clone()).await {
                self.send_delivery_receipt(from, message_id).await;
                return Outcome::Delivered;
            }
        }

        match messages::enqueue_message(&self.pool, message_id, from, to, &envelope, None, None).await {
            Ok(()) => {
                self.maybe_enqueue_webhook(to, message_id).await;
                Outcome::Queued
            }
            Err(_) => Outcome::Rejected("internal_error"),
        }
    }

    /// A queued message for a recipient with a registered webhook gets a
    /// delivery attempt row, then an immediate fire-and-forget delivery
    /// task; the webhook retry sweep only needs to pick up deliveries still
    /// pending after a crash.
    async fn maybe_enqueue_webhook(&self, to: &str, message_id: &str) {
        let Ok(Some(agent)) = agents::get_agent(&self.pool, to).await else {
            return;
        };
        if agent.webhook_url.is_none() {
            return;
        };
        let url = agent.webhook_url.clone().unwrap();
        let Ok(delivery_id) = webhooks::record_attempt(&self.pool, to, message_id, &url).await else {
            return;
        };

        let Some(message) = (match messages::message_by_id(&self.pool, message_id).await {
            Ok(message) => message,
            Err(_) => return,
        }) else {
            return;
        };

        let pool = Arc::clone(&self.pool);
        let http = self.http.clone();
        let reputation = Arc::clone(&self.reputation);
        let cooldown = self.webhook_circuit_cooldown_secs;
        tokio::spawn(async move {
            let _ = deliver_with_retries(&pool, &http, &reputation, delivery_id, &agent, &message.envelope, cooldown)
                .await;
        });
    }

    async fn route_remote(&self, envelope: Value, to: &str, hop_count: i32) -> Outcome {
        let next_hop_count = hop_count + 1;
        if next_hop_count > self.federation_max_hops {
            return Outcome::Rejected("max_hops_exceeded");
        }
        let Some(domain) = to.split_once("::").map(|(_, d)| d.to_string()) else {
            return Outcome::Rejected("invalid_address");
        };
        if self.relay_reputation.is_blocked(&self.pool, &domain).await.unwrap_or(false) {
            return Outcome::Rejected("blocked");
        }
        match federation::enqueue(&self.pool, &domain, &envelope.to_string(), next_hop_count).await {
            Ok(_) => Outcome::Federated,
            Err(_) => Outcome::Rejected("internal_error"),
        }
    }

    async fn send_delivery_receipt(&self, sender: &str, message_id: &str) {
        let receipt = json!({"type": "receipt.delivered", "message_id": message_id});
        let _ = self.connections.send_to(sender, receipt).await;
    }

    /// Push every queued, unexpired message to a newly (re)connected
    /// address, in ascending insertion order, then batch-mark them
    /// delivered and fire a best-effort `receipt.delivered` back to each
    /// original sender.
    pub async fn drain_inbox_on_reconnect(&self, address: &str) -> Result<usize, sqlx::Error> {
        let pending = messages::inbox_for(&self.pool, address).await?;
        let mut delivered_ids = Vec::new();

        for row in &pending {
            if self.connections.send_to(address, row.envelope.clone()).await {
                delivered_ids.push(row.message_id.clone());
                let message_type = row.envelope.get("type").and_then(Value::as_str).unwrap_or("");
                if message_type != "receipt.delivered" {
                    self.send_delivery_receipt(&row.from_address, &row.message_id).await;
                }
            }
        }

        if !delivered_ids.is_empty() {
            messages::mark_delivered(&self.pool, &delivered_ids).await?;
        }
        info!(%address, count = delivered_ids.len(), "drained inbox on reconnect");
        Ok(delivered_ids.len())
    }
}

fn is_local(address: &str, relay_domain: &str) -> bool {
    address.ends_with(&format!("::{relay_domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_on_our_domain_is_local() {
        assert!(is_local("alice::relay.test", "relay.test"));
        assert!(!is_local("alice::other.test", "relay.test"));
    }
}
