// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie handling and the authentication middleware.

use crate::error::AppError;
use crate::models::Identity;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "console_session";

/// Session cookie claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (server-side session ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated session, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session_id: String,
    /// Bearer token for outbound console API calls
    pub access_token: String,
    pub identity: Identity,
    pub expires_at: i64,
}

/// Extract and verify the session ID from cookie or `Authorization` header.
pub fn session_id_from_request(
    jar: &CookieJar,
    headers: &axum::http::HeaderMap,
    signing_key: &[u8],
) -> Option<String> {
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))?
            .to_string(),
    };

    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(&token, &key, &validation)
        .ok()
        .map(|data| data.claims.sub)
}

/// Middleware that requires a live, non-failed session.
///
/// Failed sessions are treated as unauthenticated; the response carries the
/// session error code so the UI can send the user back to login.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session_id) =
        session_id_from_request(&jar, request.headers(), &state.config.session_signing_key)
    else {
        return AppError::Unauthorized.into_response();
    };

    if !state.sessions.resume(&session_id).await {
        return AppError::Unauthorized.into_response();
    }

    let record = match state.sessions.valid_credential(&session_id).await {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    let Some(access_token) = record.access_token() else {
        return AppError::Unauthorized.into_response();
    };

    let auth = AuthSession {
        session_id,
        access_token: access_token.to_string(),
        identity: record.identity().clone(),
        expires_at: record.expires_at(),
    };
    request.extensions_mut().insert(auth);

    next.run(request).await
}

/// Create the signed session cookie value for a session ID.
pub fn create_session_jwt(
    session_id: &str,
    signing_key: &[u8],
    max_age_secs: i64,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: session_id.to_string(),
        iat: now,
        exp: now + max_age_secs.max(0) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Generate a random 256-bit session ID (hex).
pub fn new_session_id() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("System RNG unavailable"))?;
    Ok(hex::encode(bytes))
}
