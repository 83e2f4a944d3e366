//! Shared application state handed to every axum handler via
//! [`axum::extract::State`], following the teacher's `Arc<EventProcessor>`
//! single-state pattern.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use sqlx::AnyPool;

use crate::config::Config;
use crate::connections::ConnectionManager;
use crate::ephemeral::SessionManager;
use crate::federation::discovery::RelayDiscovery;
use crate::heartbeat::HeartbeatManager;
use crate::policy::rate_limit::SlidingWindowCounter;
use crate::policy::relay_blocklist::RelayAllowBlockList;
use crate::policy::relay_reputation::RelayReputationPolicy;
use crate::policy::reputation::ReputationPolicy;
use crate::policy::spam_filter::AllowBlockList;
use crate::routing::RoutingCore;

#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

pub struct Inner {
    pub config: Config,
    pub pool: Arc<AnyPool>,
    pub http: reqwest::Client,
    pub relay_signing_key: SigningKey,

    pub connections: Arc<ConnectionManager>,
    pub heartbeat: Arc<HeartbeatManager>,
    pub routing: RoutingCore,

    pub spam_filter: Arc<AllowBlockList>,
    pub relay_blocklist: Arc<RelayAllowBlockList>,
    pub reputation: Arc<ReputationPolicy>,
    pub relay_reputation: Arc<RelayReputationPolicy>,
    pub registration_limiter: SlidingWindowCounter,

    pub discovery: RelayDiscovery,
    pub ephemeral_sessions: SessionManager,
}

impl std::ops::Deref for AppState {
    type Target = Inner;
    fn deref(&self) -> &Inner {
        &self.0
    }
}

impl AppState {
    pub async fn build(config: Config, pool: AnyPool, relay_signing_key: SigningKey) -> Self {
        let pool = Arc::new(pool);
        let http = reqwest::Client::new();
        let connections = Arc::new(ConnectionManager::new());
        let heartbeat = HeartbeatManager::new(Arc::clone(&connections));

        let spam_filter = Arc::new(
            AllowBlockList::load(&pool)
                .await
                .unwrap_or_else(|_| AllowBlockList::empty()),
        );
        let relay_blocklist = Arc::new(
            RelayAllowBlockList::load(&pool)
                .await
                .unwrap_or_else(|_| RelayAllowBlockList::empty()),
        );
        let reputation = Arc::new(ReputationPolicy::new(&config));
        let relay_reputation = Arc::new(RelayReputationPolicy::new(&config));

        let routing = RoutingCore::new(
            Arc::clone(&pool),
            Arc::clone(&connections),
            Arc::clone(&spam_filter),
            Arc::clone(&reputation),
            Arc::clone(&relay_reputation),
            http.clone(),
            &config,
        );

        let discovery = RelayDiscovery::new(Duration::from_secs(
            (config.federation_discovery_ttl_hours * 3600) as u64,
        ));
        let ephemeral_sessions = SessionManager::new(10, 1000);
        let registration_limiter = SlidingWindowCounter::new(5, Duration::from_secs(60));

        Self(Arc::new(Inner {
            config,
            pool,
            http,
            relay_signing_key,
            connections,
            heartbeat,
            routing,
            spam_filter,
            relay_blocklist,
            reputation,
            relay_reputation,
            registration_limiter,
            discovery,
            ephemeral_sessions,
        }))
    }
}
