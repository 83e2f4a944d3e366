//! WebSocket connection registry keyed by agent address.
//!
//! All map mutations go through a single [`tokio::sync::Mutex`] to avoid
//! races between concurrent connect/disconnect/send calls, mirroring the
//! original `asyncio.Lock`-guarded dict.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// One item queued to a connected agent's WebSocket write half: either an
/// envelope to push, or an instruction to close the socket with a specific
/// code/reason (used to evict a superseded connection cleanly).
#[derive(Debug, Clone)]
pub enum Frame {
    Message(Value),
    Close { code: u16, reason: &'static str },
}

pub type Outbox = mpsc::UnboundedSender<Frame>;

#[derive(Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<String, Outbox>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `outbox` for `address`. Last-connect-wins: an existing
    /// connection for the same address is told to close with code 1000
    /// ("new connection") before the new one replaces it in the map.
    pub async fn connect(&self, address: &str, outbox: Outbox) {
        let mut conns = self.connections.lock().await;
        if let Some(previous) = conns.insert(address.to_string(), outbox) {
            let _ = previous.send(Frame::Close { code: 1000, reason: "new connection" });
        }
    }

    pub async fn disconnect(&self, address: &str) {
        let mut conns = self.connections.lock().await;
        conns.remove(address);
    }

    pub async fn is_online(&self, address: &str) -> bool {
        self.connections.lock().await.contains_key(address)
    }

    /// Send `data` to `address`. Returns `true` if a live connection
    /// accepted the frame. A send failure (closed channel) disconnects the
    /// dead entry and returns `false`.
    pub async fn send_to(&self, address: &str, data: Value) -> bool {
        let outbox = {
            let conns = self.connections.lock().await;
            conns.get(address).cloned()
        };
        let Some(outbox) = outbox else {
            return false;
        };
        if outbox.send(Frame::Message(data)).is_ok() {
            true
        } else {
            debug!(%address, "send failed, disconnecting");
            self.disconnect(address).await;
            false
        }
    }

    pub async fn online_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn online_addresses(&self) -> Vec<String> {
        self.connections.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_connect_wins_and_old_channel_is_dropped() {
        let manager = ConnectionManager::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        manager.connect("alice::relay.test", tx1).await;
        manager.connect("alice::relay.test", tx2).await;
        drop(rx1);

        assert!(manager.send_to("alice::relay.test", Value::Null).await);
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn connecting_over_an_existing_session_closes_it_with_code_1000() {
        let manager = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        manager.connect("alice::relay.test", tx1).await;
        manager.connect("alice::relay.test", tx2).await;

        match rx1.recv().await {
            Some(Frame::Close { code, .. }) => assert_eq!(code, 1000),
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_to_unknown_address_returns_false() {
        let manager = ConnectionManager::new();
        assert!(!manager.send_to("nobody::relay.test", Value::Null).await);
    }

    #[tokio::test]
    async fn send_failure_disconnects_dead_entry() {
        let manager = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        manager.connect("bob::relay.test", tx).await;
        drop(rx);

        assert!(manager.is_online("bob::relay.test").await);
        assert!(!manager.send_to("bob::relay.test", Value::Null).await);
        assert!(!manager.is_online("bob::relay.test").await);
    }

    #[tokio::test]
    async fn online_addresses_reflects_current_membership() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.connect("carol::relay.test", tx).await;
        assert_eq!(manager.online_count().await, 1);
        assert_eq!(manager.online_addresses().await, vec!["carol::relay.test".to_string()]);
    }
}
