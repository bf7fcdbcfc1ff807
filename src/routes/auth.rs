// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login, logout and session read routes.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{
    create_session_jwt, new_session_id, session_id_from_request, SESSION_COOKIE,
};
use crate::models::SessionView;
use crate::services::idp::authorize_url;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// OAuth state older than this is rejected.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/oauth/start", get(auth_start))
        .route("/auth/oauth/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Console path to land on after login.
    #[serde(default, rename = "callbackUrl")]
    callback_url: Option<String>,
}

/// Start OAuth flow - redirect to the identity provider.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let callback_url = sanitize_callback(params.callback_url.as_deref());

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let oauth_state = sign_state(&callback_url, timestamp, &state.config.oauth_state_key)?;
    let redirect_uri = redirect_uri(&headers);

    let url = authorize_url(
        &state.config.oidc_issuer_url,
        &state.config.oidc_client_id,
        &redirect_uri,
        &oauth_state,
    );

    tracing::info!(callback_url = %callback_url, "Starting OAuth flow");

    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let callback_url = verify_state(&params.state, &state.config.oauth_state_key, now_ms)
        .ok_or_else(|| {
            tracing::warn!("Invalid, expired or tampered OAuth state parameter");
            AppError::BadRequest("Invalid OAuth state".to_string())
        })?;

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from identity provider");
        let redirect = format!(
            "{}/?error={}",
            state.config.frontend_url,
            urlencoding::encode(&error)
        );
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let login = state
        .idp
        .exchange_code(&code, &redirect_uri(&headers))
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    let session_id = new_session_id()?;
    state.sessions.establish(&session_id, login).await;

    let jwt = create_session_jwt(
        &session_id,
        &state.config.session_signing_key,
        state.config.session_max_age_secs,
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Session token creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!is_local(&headers))
        .max_age(time::Duration::seconds(state.config.session_max_age_secs));

    let redirect = format!("{}{}", state.config.frontend_url, callback_url);
    Ok((jar.add(cookie), Redirect::temporary(&redirect)))
}

/// Logout - drop the server-side session and clear the cookie.
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (StatusCode, CookieJar) {
    if let Some(session_id) =
        session_id_from_request(&jar, &headers, &state.config.session_signing_key)
    {
        state.sessions.logout(&session_id).await;
    }

    let removal = Cookie::build(SESSION_COOKIE)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!is_local(&headers));

    (StatusCode::NO_CONTENT, jar.remove(removal))
}

/// Session read contract: `{ accessToken, error }`.
async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Json<SessionView> {
    let Some(session_id) =
        session_id_from_request(&jar, &headers, &state.config.session_signing_key)
    else {
        return Json(SessionView::anonymous());
    };

    if !state.sessions.resume(&session_id).await {
        return Json(SessionView::anonymous());
    }

    Json(state.sessions.session_view(&session_id).await)
}

fn is_local(headers: &HeaderMap) -> bool {
    let host = request_host(headers);
    host.contains("localhost") || host.contains("127.0.0.1")
}

fn request_host(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:3005".to_string())
        })
}

/// Callback URL registered with the IdP, derived from the request host.
fn redirect_uri(headers: &HeaderMap) -> String {
    let scheme = if is_local(headers) { "http" } else { "https" };
    format!("{}://{}/auth/oauth/callback", scheme, request_host(headers))
}

/// Only same-site absolute paths are allowed as post-login targets.
fn sanitize_callback(callback_url: Option<&str>) -> String {
    match callback_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('|') => {
            url.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Encode `callback_url|timestamp_hex|signature_hex` as base64url.
fn sign_state(callback_url: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", callback_url, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the HMAC signature and age of an OAuth state parameter and return
/// the callback URL it carries.
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    let [callback_url, timestamp_hex, signature_hex] = parts.as_slice() else {
        return None;
    };

    let payload = format!("{}|{}", callback_url, timestamp_hex);
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > STATE_MAX_AGE_MS {
        return None;
    }

    Some(callback_url.to_string())
}
