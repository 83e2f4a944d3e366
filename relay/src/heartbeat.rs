//! Application-level ping/pong liveness tracking for WebSocket connections.
//!
//! A background task pings every tracked address on an interval and drops
//! any address that hasn't produced a pong within `ping_interval +
//! pong_timeout`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::connections::ConnectionManager;

pub const PING_INTERVAL: Duration = Duration::from_secs(30);
pub const PONG_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HeartbeatManager {
    manager: Arc<ConnectionManager>,
    ping_interval: Duration,
    pong_timeout: Duration,
    last_pong: Mutex<HashMap<String, Instant>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatManager {
    pub fn new(manager: Arc<ConnectionManager>) -> Arc<Self> {
        Self::with_intervals(manager, PING_INTERVAL, PONG_TIMEOUT)
    }

    pub fn with_intervals(
        manager: Arc<ConnectionManager>,
        ping_interval: Duration,
        pong_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            ping_interval,
            pong_timeout,
            last_pong: Mutex::new(HashMap::new()),
            task: Mutex::new(None),
        })
    }

    /// Spawn the background ping loop. Idempotent: calling twice replaces
    /// the previous task handle without aborting it, so callers should only
    /// call this once at startup.
    pub async fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.ping_loop().await });
        *self.task.lock().await = Some(handle);
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn record_connect(&self, address: &str) {
        self.last_pong.lock().await.insert(address.to_string(), Instant::now());
    }

    pub async fn record_pong(&self, address: &str) {
        self.last_pong.lock().await.insert(address.to_string(), Instant::now());
    }

    pub async fn record_disconnect(&self, address: &str) {
        self.last_pong.lock().await.remove(address);
    }

    async fn ping_loop(&self) {
        loop {
            tokio::time::sleep(self.ping_interval).await;
            let now = Instant::now();

            let addresses: Vec<String> = self.last_pong.lock().await.keys().cloned().collect();
            for address in addresses {
                let last = { self.last_pong.lock().await.get(&address).copied() };
                let Some(last) = last else { continue };

                if now.duration_since(last) > self.ping_interval + self.pong_timeout {
                    warn!(%address, elapsed_secs = now.duration_since(last).as_secs_f64(), "heartbeat timeout, disconnecting");
                    self.manager.disconnect(&address).await;
                    self.last_pong.lock().await.remove(&address);
                } else {
                    self.manager
                        .send_to(&address, json!({"type": "ping"}))
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_connect_then_record_disconnect_clears_tracking() {
        let manager = Arc::new(ConnectionManager::new());
        let hb = HeartbeatManager::new(manager);
        hb.record_connect("alice::relay.test").await;
        assert!(hb.last_pong.lock().await.contains_key("alice::relay.test"));
        hb.record_disconnect("alice::relay.test").await;
        assert!(!hb.last_pong.lock().await.contains_key("alice::relay.test"));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_harmless_noop() {
        let manager = Arc::new(ConnectionManager::new());
        let hb = HeartbeatManager::new(manager);
        hb.stop().await;
    }
}
