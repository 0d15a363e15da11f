//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors surfaced by login, verify and refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad credentials, malformed or forged token, unknown refresh token.
    Authentication(String),
    /// Valid identity without the privilege for the request.
    Authorization(String),
    /// Signing or storage failure unrelated to caller input.
    Unexpected(String),
}

impl AuthError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Authentication(msg) | Self::Authorization(msg) | Self::Unexpected(msg) => msg,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication(msg) => write!(f, "authentication error: {}", msg),
            Self::Authorization(msg) => write!(f, "authorization error: {}", msg),
            Self::Unexpected(msg) => write!(f, "unexpected error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
