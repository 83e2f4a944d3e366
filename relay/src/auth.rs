//! Bearer token authentication. HTTP handlers use [`AuthenticatedAgent`] as
//! an extractor and get a 401 for a missing or unknown token; the WebSocket
//! handshake uses [`verify_token_ws`] directly since a failed upgrade must
//! close the socket rather than raise an HTTP error.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;

use crate::db::agents::{self, AgentRow};
use crate::error::RelayError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthenticatedAgent {
    pub address: String,
    pub public_key: String,
}

impl From<AgentRow> for AuthenticatedAgent {
    fn from(row: AgentRow) -> Self {
        Self { address: row.address, public_key: row.public_key }
    }
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthenticatedAgent {
    type Rejection = RelayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|_| RelayError::Unauthorized)?;

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(RelayError::Unauthorized)?;

        let agent = agents::get_agent_by_token(&state.pool, token)
            .await
            .map_err(RelayError::from)?
            .ok_or(RelayError::Unauthorized)?;

        Ok(agent.into())
    }
}

/// WebSocket-flavored token check: returns `None` on any failure instead of
/// raising, since the caller closes the connection manually.
pub async fn verify_token_ws(pool: &sqlx::AnyPool, token: &str) -> Option<AgentRow> {
    agents::get_agent_by_token(pool, token).await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_agent_carries_address_and_key() {
        let row = AgentRow {
            address: "alice::example.com".to_string(),
            public_key: "abc123".to_string(),
            token: "secret-token".to_string(),
            webhook_url: None,
            verified_domain: None,
            metadata: serde_json::Value::Null,
        };
        let agent: AuthenticatedAgent = row.into();
        assert_eq!(agent.address, "alice::example.com");
        assert_eq!(agent.public_key, "abc123");
    }
}
