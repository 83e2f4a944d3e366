//! Assembles the full HTTP/WebSocket surface.

pub mod agents;
pub mod federation_routes;
pub mod health;
pub mod inbox;
pub mod register;
pub mod send;
pub mod verify_domain;
pub mod webhook_routes;
pub mod ws;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    let cors = if state.config.cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = state
            .config
            .cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let api_v1 = Router::new()
        .route("/register", post(register::register))
        .route("/send", post(send::send))
        .route("/inbox/{address}", get(inbox::get_inbox))
        .route("/messages/thread/{thread_id}", get(inbox::get_thread))
        .route("/messages/{message_id}/receipt", post(inbox::submit_receipt))
        .route("/agents/{address}/public-key", get(agents::public_key))
        .route("/agents/{address}/presence", get(agents::presence))
        .route(
            "/agents/{address}/webhook",
            put(webhook_routes::set_webhook_url)
                .get(webhook_routes::get_webhook_url)
                .delete(webhook_routes::delete_webhook_url),
        )
        .route(
            "/agents/{address}/webhook/deliveries",
            get(webhook_routes::list_webhook_deliveries),
        )
        .route("/verify-domain", post(verify_domain::verify_domain))
        .route("/federation/deliver", post(federation_routes::deliver));

    // `/health`, `/ws`, and `/admin/*` are operational endpoints, exempted
    // from the versioned API prefix per spec §6.
    Router::new()
        .nest("/api/v1", api_v1)
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        .merge(admin::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
