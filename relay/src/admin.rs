//! Admin API: blocklist/allowlist/reputation management behind constant-time
//! `X-Admin-Key` header comparison. A relay with no configured admin key
//! refuses every admin request with 503 rather than silently allowing them.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use subtle::ConstantTimeEq;

use crate::db::{audit, relay_blocklist, reputation, spam};
use crate::error::{RelayError, Result};
use crate::models::{
    AllowlistEntry, AllowlistListResponse, AllowlistRequest, AuditLogEntry, AuditLogResponse,
    BlocklistEntry, BlocklistListResponse, BlocklistRequest, ReputationResponse,
    SetReputationRequest,
};
use crate::state::AppState;

fn check_admin_key(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(configured) = &state.config.admin_api_key else {
        return Err(RelayError::Unavailable("admin API not configured".to_string()));
    };
    let provided = headers
        .get("X-Admin-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::Unauthorized)?;

    if provided.as_bytes().ct_eq(configured.as_bytes()).into() {
        Ok(())
    } else {
        Err(RelayError::Unauthorized)
    }
}

async fn add_blocked(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BlocklistRequest>,
) -> Result<impl IntoResponse> {
    check_admin_key(&state, &headers)?;
    if let Err(reason) = spam::classify_pattern(&body.pattern) {
        return Err(RelayError::InvalidAddress(reason));
    }
    spam::add_blocked(&state.pool, &body.pattern, body.reason.as_deref()).await?;
    state.spam_filter.refresh(&state.pool).await?;
    let _ = audit::record(&state.pool, "admin", "blocklist.add", Some(&body.pattern), body.reason.as_deref()).await;
    Ok((StatusCode::CREATED, Json(BlocklistEntry { pattern: body.pattern, reason: body.reason })))
}

async fn remove_blocked(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(pattern): Path<String>,
) -> Result<impl IntoResponse> {
    check_admin_key(&state, &headers)?;
    let removed = spam::remove_blocked(&state.pool, &pattern).await?;
    state.spam_filter.refresh(&state.pool).await?;
    if removed {
        let _ = audit::record(&state.pool, "admin", "blocklist.remove", Some(&pattern), None).await;
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RelayError::NotFound("pattern not found".to_string()))
    }
}

async fn list_blocked(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BlocklistListResponse>> {
    check_admin_key(&state, &headers)?;
    let entries = spam::list_blocked(&state.pool)
        .await?
        .into_iter()
        .map(|e| BlocklistEntry { pattern: e.pattern, reason: e.reason })
        .collect();
    Ok(Json(BlocklistListResponse { entries }))
}

async fn add_allowed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AllowlistRequest>,
) -> Result<impl IntoResponse> {
    check_admin_key(&state, &headers)?;
    if let Err(reason) = spam::classify_pattern(&body.pattern) {
        return Err(RelayError::InvalidAddress(reason));
    }
    spam::add_allowed(&state.pool, &body.pattern, body.reason.as_deref()).await?;
    state.spam_filter.refresh(&state.pool).await?;
    let _ = audit::record(&state.pool, "admin", "allowlist.add", Some(&body.pattern), body.reason.as_deref()).await;
    Ok((StatusCode::CREATED, Json(AllowlistEntry { pattern: body.pattern, reason: body.reason })))
}

async fn remove_allowed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(pattern): Path<String>,
) -> Result<impl IntoResponse> {
    check_admin_key(&state, &headers)?;
    let removed = spam::remove_allowed(&state.pool, &pattern).await?;
    state.spam_filter.refresh(&state.pool).await?;
    if removed {
        let _ = audit::record(&state.pool, "admin", "allowlist.remove", Some(&pattern), None).await;
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RelayError::NotFound("pattern not found".to_string()))
    }
}

async fn list_allowed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AllowlistListResponse>> {
    check_admin_key(&state, &headers)?;
    let entries = spam::list_allowed(&state.pool)
        .await?
        .into_iter()
        .map(|e| AllowlistEntry { pattern: e.pattern, reason: e.reason })
        .collect();
    Ok(Json(AllowlistListResponse { entries }))
}

async fn add_blocked_relay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse> {
    check_admin_key(&state, &headers)?;
    relay_blocklist::add_blocked(&state.pool, &domain, None).await?;
    state.relay_blocklist.refresh(&state.pool).await?;
    let _ = audit::record(&state.pool, "admin", "relay_blocklist.add", Some(&domain), None).await;
    Ok(StatusCode::CREATED)
}

async fn get_reputation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
) -> Result<Json<ReputationResponse>> {
    check_admin_key(&state, &headers)?;
    let info = reputation::get_info(&state.pool, &address)
        .await?
        .ok_or_else(|| RelayError::NotFound("agent has no reputation record".to_string()))?;
    let tier = reputation::tier_for_score(info.score);
    Ok(Json(ReputationResponse {
        address: info.address,
        score: info.score,
        tier: tier.name(),
        messages_sent: info.messages_sent,
        messages_rejected: info.messages_rejected,
    }))
}

async fn set_reputation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
    Json(body): Json<SetReputationRequest>,
) -> Result<StatusCode> {
    check_admin_key(&state, &headers)?;
    reputation::set_score(&state.pool, &address, body.score).await?;
    let _ = audit::record(&state.pool, "admin", "reputation.set", Some(&address), Some(&body.score.to_string())).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn audit_log(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<AuditLogResponse>> {
    check_admin_key(&state, &headers)?;
    let entries = audit::recent(&state.pool, 200)
        .await?
        .into_iter()
        .map(|e| AuditLogEntry {
            actor: e.actor,
            action: e.action,
            target: e.target,
            detail: e.detail,
            created_at: e.created_at,
        })
        .collect();
    Ok(Json(AuditLogResponse { entries }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/blocklist", post(add_blocked).get(list_blocked))
        .route("/admin/blocklist/{*pattern}", delete(remove_blocked))
        .route("/admin/allowlist", post(add_allowed).get(list_allowed))
        .route("/admin/allowlist/{*pattern}", delete(remove_allowed))
        .route("/admin/relay-blocklist/{domain}", post(add_blocked_relay))
        .route("/admin/reputation/{address}", get(get_reputation).put(set_reputation))
        .route("/admin/audit-log", get(audit_log))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_compare_matches_equal_keys() {
        let a = b"supersecret";
        let b = b"supersecret";
        assert!(bool::from(a.ct_eq(b)));
    }

    #[test]
    fn constant_time_compare_rejects_mismatched_keys() {
        let a = b"supersecret";
        let b = b"wrongkey123";
        assert!(!bool::from(a.ct_eq(b)));
    }
}
