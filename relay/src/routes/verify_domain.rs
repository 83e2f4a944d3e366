//! `POST /verify-domain` — Tier 2 domain ownership verification.

use axum::extract::State;
use axum::Json;

use crate::auth::AuthenticatedAgent;
use crate::db::{agents, domain_verification, reputation};
use crate::error::Result;
use crate::models::{VerifyDomainRequest, VerifyDomainResponse};
use crate::state::AppState;
use crate::verification::verify_domain_ownership;

pub async fn verify_domain(
    State(state): State<AppState>,
    agent: AuthenticatedAgent,
    Json(body): Json<VerifyDomainRequest>,
) -> Result<Json<VerifyDomainResponse>> {
    let outcome = verify_domain_ownership(&state.http, &body.domain, &agent.public_key, &agent.address).await;

    if outcome.success {
        let method = outcome.method.as_ref().map(|m| m.as_str()).unwrap_or("dns");
        domain_verification::record_verification(&state.pool, &agent.address, &body.domain, &agent.public_key, method)
            .await?;
        agents::set_verified_domain(&state.pool, &agent.address, &body.domain).await?;
        reputation::set_score(&state.pool, &agent.address, state.config.reputation_dns_verified_score).await?;
    }

    Ok(Json(VerifyDomainResponse {
        success: outcome.success,
        method: outcome.method.map(|m| m.as_str().to_string()),
        detail: outcome.detail,
    }))
}
