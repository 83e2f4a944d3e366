//! Application-level error type for the relay server, mapped to HTTP
//! responses at the edge of the router.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_protocol::ProtocolError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("authentication failed")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate message")]
    Duplicate,

    #[error("rate limited")]
    RateLimited,

    #[error("blocked by policy")]
    Blocked,

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidAddress(_) => "invalid_address",
            RelayError::Protocol(ProtocolError::InvalidEnvelope(_)) => "invalid_envelope",
            RelayError::Protocol(ProtocolError::EnvelopeTooLarge { .. }) => "envelope_too_large",
            RelayError::Protocol(ProtocolError::SignatureVerification) => {
                "signature_verification"
            }
            RelayError::Protocol(_) => "invalid_envelope",
            RelayError::Unauthorized => "unauthorized",
            RelayError::Forbidden(_) => "forbidden",
            RelayError::NotFound(_) => "not_found",
            RelayError::Duplicate => "duplicate",
            RelayError::RateLimited => "rate_limited",
            RelayError::Blocked => "blocked",
            RelayError::Unavailable(_) => "unavailable",
            RelayError::Database(_) => "internal_error",
            RelayError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            RelayError::Protocol(_) => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::Forbidden(_) => StatusCode::FORBIDDEN,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Duplicate => StatusCode::CONFLICT,
            RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Blocked => StatusCode::FORBIDDEN,
            RelayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error serving request");
        }
        let body = Json(json!({ "error": self.kind(), "detail": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
