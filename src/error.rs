//! Error taxonomy shared by the HTTP and realtime boundaries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Message carried by `PollError::Unauthorized` when a token's expiry has passed
pub const TOKEN_EXPIRED: &str = "Token expired";

/// Result type for poll operations
pub type PollResult<T> = Result<T, PollError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PollError {
    pub fn poll_not_found(poll_id: &str) -> Self {
        Self::NotFound(format!("Poll with ID {} not found", poll_id))
    }

    /// Stable machine-readable name used in the `kind` field of error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for PollError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                Self::Unauthorized(TOKEN_EXPIRED.to_string())
            }
            _ => Self::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref msg) = self {
            tracing::error!("Internal error: {}", msg);
        }
        let body = json!({ "kind": self.kind(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
