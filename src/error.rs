// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures of the session token lifecycle.
///
/// Only [`SessionError::TransientNetworkFailure`] is retryable; every other
/// variant is terminal and moves the session to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Identity provider unreachable: {0}")]
    TransientNetworkFailure(String),

    #[error("Refresh token rejected by identity provider")]
    RefreshTokenRevoked,

    #[error("Unexpected identity provider response: {0}")]
    UnknownProviderError(String),
}

impl SessionError {
    /// Whether this failure ends the session.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, SessionError::TransientNetworkFailure(_))
    }

    /// Stable code exposed in the session view.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::MissingRefreshToken => "MissingRefreshToken",
            SessionError::TransientNetworkFailure(_) => "TransientNetworkFailure",
            SessionError::RefreshTokenRevoked => "RefreshTokenRevoked",
            SessionError::UnknownProviderError(_) => "UnknownProviderError",
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Session unusable: {0}")]
    Session(#[from] SessionError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Console API error: {0}")]
    ConsoleApi(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Session(err) if !err.is_permanent() => {
                (StatusCode::SERVICE_UNAVAILABLE, err.code(), None)
            }
            AppError::Session(err) => (StatusCode::UNAUTHORIZED, err.code(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::IdentityProvider(msg) => {
                tracing::warn!(error = %msg, "Identity provider error");
                (StatusCode::BAD_GATEWAY, "identity_provider_error", None)
            }
            AppError::ConsoleApi(msg) => {
                (StatusCode::BAD_GATEWAY, "console_api_error", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
