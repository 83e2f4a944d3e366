//! Ephemeral demo-widget sessions: a bounded, TTL-expiring in-memory store.
//!
//! Each session owns a real Ed25519 keypair the relay holds on the
//! session's behalf so it can sign and decrypt for a browser client that
//! never sees raw key material. No REST surface is exposed for this
//! module; it exists so routing and the connection manager have a real
//! entity to address when a demo agent sends or receives.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use relay_protocol::keys::{generate_keypair, serialize_signing_key, serialize_verify_key};

#[derive(Debug, Clone)]
pub struct EphemeralSession {
    pub session_id: String,
    pub address: String,
    pub token: String,
    pub signing_key_b64: String,
    pub verify_key_b64: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub struct SessionManager {
    sessions: Mutex<HashMap<String, EphemeralSession>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(ttl_minutes: i64, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(ttl_minutes),
            max_sessions,
        }
    }

    /// Create a session with a fresh keypair, evicting the oldest session
    /// first if the store is at capacity.
    pub fn create(&self, relay_domain: &str) -> EphemeralSession {
        let signing_key = generate_keypair();
        let verify_key = signing_key.verifying_key();
        let agent_name = format!("demo-{}", random_token(8));
        let now = Utc::now();

        let session = EphemeralSession {
            session_id: random_token(32),
            address: format!("{agent_name}::{relay_domain}"),
            token: random_token(32),
            signing_key_b64: serialize_signing_key(&signing_key),
            verify_key_b64: serialize_verify_key(&verify_key),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.len() >= self.max_sessions {
            if let Some(oldest_key) = sessions
                .iter()
                .min_by_key(|(_, s)| s.created_at)
                .map(|(k, _)| k.clone())
            {
                sessions.remove(&oldest_key);
            }
        }
        sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    /// Return the session if present and unexpired; expired entries are
    /// pruned on access.
    pub fn get(&self, session_id: &str) -> Option<EphemeralSession> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get(session_id)?;
        if Utc::now() >= session.expires_at {
            sessions.remove(session_id);
            return None;
        }
        Some(session.clone())
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now >= s.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            sessions.remove(key);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_session_is_retrievable_until_it_expires() {
        let manager = SessionManager::new(10, 1000);
        let session = manager.create("relay.test");
        assert!(manager.get(&session.session_id).is_some());
    }

    #[test]
    fn unknown_session_id_returns_none() {
        let manager = SessionManager::new(10, 1000);
        assert!(manager.get("nonexistent").is_none());
    }

    #[test]
    fn capacity_eviction_drops_the_oldest_session() {
        let manager = SessionManager::new(10, 2);
        let first = manager.create("relay.test");
        manager.create("relay.test");
        manager.create("relay.test");
        assert!(manager.get(&first.session_id).is_none());
    }

    #[test]
    fn cleanup_expired_with_no_expired_sessions_removes_nothing() {
        let manager = SessionManager::new(10, 1000);
        manager.create("relay.test");
        assert_eq!(manager.cleanup_expired(), 0);
    }
}
