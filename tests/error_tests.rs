// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use console_session::error::{AppError, SessionError};

#[test]
fn test_only_transient_failures_are_retryable() {
    assert!(!SessionError::TransientNetworkFailure("timeout".to_string()).is_permanent());

    assert!(SessionError::MissingRefreshToken.is_permanent());
    assert!(SessionError::RefreshTokenRevoked.is_permanent());
    assert!(SessionError::UnknownProviderError("HTTP 400".to_string()).is_permanent());
}

#[test]
fn test_session_error_codes() {
    assert_eq!(SessionError::MissingRefreshToken.code(), "MissingRefreshToken");
    assert_eq!(SessionError::RefreshTokenRevoked.code(), "RefreshTokenRevoked");
    assert_eq!(
        SessionError::UnknownProviderError(String::new()).code(),
        "UnknownProviderError"
    );
    assert_eq!(
        SessionError::TransientNetworkFailure(String::new()).code(),
        "TransientNetworkFailure"
    );
}

#[test]
fn test_session_error_status_mapping() {
    let response = AppError::from(SessionError::RefreshTokenRevoked).into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = AppError::from(SessionError::MissingRefreshToken).into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response =
        AppError::from(SessionError::TransientNetworkFailure("down".to_string())).into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_other_error_status_mapping() {
    assert_eq!(
        AppError::Unauthorized.into_response().status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        AppError::BadRequest("nope".to_string())
            .into_response()
            .status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::ConsoleApi("HTTP 500".to_string())
            .into_response()
            .status(),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        AppError::Internal(anyhow::anyhow!("boom"))
            .into_response()
            .status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
