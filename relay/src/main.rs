//! Relay server entry point: configuration, schema, key material, and the
//! background workers that drain the federation outbox, the webhook retry
//! queue, and the various expiry sweeps.

mod admin;
mod auth;
mod config;
mod connections;
mod db;
mod ephemeral;
mod error;
mod federation;
mod heartbeat;
mod models;
mod policy;
mod routes;
mod routing;
mod state;
mod verification;
mod webhook;

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use relay_protocol::keys::{deserialize_signing_key, generate_keypair, serialize_signing_key};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let relay_signing_key = load_or_generate_relay_key(&config.relay_key_path)?;

    let pool = db::pool::create_pool(&config).await?;
    db::schema::create_tables(&pool).await?;

    let bind_addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::build(config, pool, relay_signing_key).await;

    spawn_background_workers(&state);

    let app = routes::router(&state).with_state(state);

    tracing::info!(%bind_addr, "relay listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Load the relay's persistent Ed25519 identity from disk, generating and
/// persisting a fresh one (mode 0600) on first boot.
fn load_or_generate_relay_key(path: &str) -> anyhow::Result<ed25519_dalek::SigningKey> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        return Ok(deserialize_signing_key(existing.trim())?);
    }

    let key = generate_keypair();
    std::fs::write(path, serialize_signing_key(&key))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    tracing::info!(%path, "generated new relay identity keypair");
    Ok(key)
}

fn spawn_background_workers(state: &AppState) {
    tokio::spawn({
        let heartbeat = Arc::clone(&state.heartbeat);
        async move { heartbeat.start().await }
    });

    tokio::spawn(message_expiry_loop(state.clone()));
    tokio::spawn(handshake_expiry_loop(state.clone()));
    tokio::spawn(federation_retry_loop(state.clone()));
    tokio::spawn(webhook_retry_loop(state.clone()));
    tokio::spawn(ephemeral_cleanup_loop(state.clone()));
    tokio::spawn(verification::reverification_loop(
        Arc::clone(&state.pool),
        state.http.clone(),
        state.config.domain_verification_ttl_hours,
        state.config.reputation_default_score,
    ));
}

/// Expire stale queued messages and hard-purge anything past the retention
/// window, every five minutes.
async fn message_expiry_loop(state: AppState) {
    loop {
        tokio::time::sleep(Duration::from_secs(300)).await;
        match db::retry::with_retry("expire_stale_messages", || db::messages::expire_stale_messages(&state.pool)).await
        {
            Ok(count) if count > 0 => tracing::info!(count, "expired stale queued messages"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "message expiry sweep failed"),
        }
        let purge = db::retry::with_retry("purge_expired_messages", || {
            db::messages::purge_expired_messages(&state.pool, state.config.message_retention_days)
        })
        .await;
        if let Err(err) = purge {
            tracing::warn!(error = %err, "message purge sweep failed");
        }
    }
}

/// Expire handshakes that have sat pending for too long, hourly.
async fn handshake_expiry_loop(state: AppState) {
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        let result =
            db::retry::with_retry("expire_stale_handshakes", || db::handshakes::expire_stale_handshakes(&state.pool, 72))
                .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "handshake expiry sweep failed");
        }
    }
}

/// Drain the federation outbox on a short poll interval; `process_entry`
/// itself enforces the retry schedule and dead-letters exhausted entries.
async fn federation_retry_loop(state: AppState) {
    if !state.config.federation_enabled {
        return;
    }
    loop {
        tokio::time::sleep(Duration::from_secs(15)).await;
        let due = match db::federation::due_for_retry(&state.pool, 50).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "federation outbox poll failed");
                continue;
            }
        };
        for entry in due {
            let outcome = federation::forwarder::process_entry(
                &state.pool,
                &state.http,
                &state.discovery,
                &state.relay_signing_key,
                &state.config.relay_domain,
                state.config.federation_max_hops as i32,
                entry,
            )
            .await;
            if let Err(err) = outcome {
                tracing::warn!(error = %err, "federation outbox entry processing failed");
            }
        }
    }
}

/// Pick up webhook deliveries due for their next attempt and run them to
/// completion; `deliver_with_retries` owns the remaining backoff schedule
/// for each one it picks up.
async fn webhook_retry_loop(state: AppState) {
    loop {
        tokio::time::sleep(Duration::from_secs(15)).await;
        let due = match db::webhooks::due_for_retry(&state.pool).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "webhook retry queue poll failed");
                continue;
            }
        };
        for row in due {
            let Ok(Some(agent)) = db::agents::get_agent(&state.pool, &row.agent_address).await else {
                continue;
            };
            let Ok(Some(message)) = db::messages::message_by_id(&state.pool, &row.message_id).await else {
                continue;
            };
            let pool = Arc::clone(&state.pool);
            let http = state.http.clone();
            let reputation = Arc::clone(&state.reputation);
            let cooldown = state.config.webhook_circuit_cooldown_seconds;
            tokio::spawn(async move {
                if let Err(err) = webhook::delivery::deliver_with_retries(
                    &pool,
                    &http,
                    &reputation,
                    row.id,
                    &agent,
                    &message.envelope,
                    cooldown,
                )
                .await
                {
                    tracing::warn!(error = %err, "webhook delivery task failed");
                }
            });
        }
    }
}

async fn ephemeral_cleanup_loop(state: AppState) {
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        let evicted = state.ephemeral_sessions.cleanup_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "swept expired ephemeral sessions");
        }
    }
}
