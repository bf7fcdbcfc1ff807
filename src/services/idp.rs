// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OpenID Connect identity provider client.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization code exchange and userinfo lookup at login
//! - Refresh grants, with failures classified as transient or permanent

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::SessionError;
use crate::models::{Identity, LoginResult, TokenGrant};
use crate::time_utils::clamp_epoch_secs;

/// Token endpoint operations the session manager depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Redeem a refresh token for new tokens.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SessionError>;

    /// Exchange an authorization code and collect the user's claims.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<LoginResult, SessionError>;
}

/// Client for a Keycloak-style OpenID Connect realm.
#[derive(Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    issuer_url: String,
    client_id: String,
    client_secret: String,
}

impl OidcClient {
    /// Create a client for the realm at `issuer_url`.
    pub fn new(issuer_url: &str, client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            issuer_url: issuer_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/protocol/openid-connect/{}", self.issuer_url, name)
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, SessionError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                SessionError::TransientNetworkFailure(format!("Token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| SessionError::UnknownProviderError(format!("JSON parse error: {}", e)))
    }

    async fn userinfo(&self, access_token: &str) -> Result<UserInfo, SessionError> {
        let response = self
            .http
            .get(self.endpoint("userinfo"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                SessionError::TransientNetworkFailure(format!("Userinfo request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| SessionError::UnknownProviderError(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SessionError> {
        let tokens = self
            .post_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;

        tokens.into_grant(Utc::now().timestamp())
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<LoginResult, SessionError> {
        let tokens = self
            .post_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;

        let grant = tokens.into_grant(Utc::now().timestamp())?;
        let info = self.userinfo(&grant.access_token).await?;

        tracing::info!(subject = %info.sub, "Authorization code exchanged");

        Ok(LoginResult {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant.expires_at,
            identity: info.into(),
        })
    }
}

/// Browser redirect target that starts the authorization code flow.
pub fn authorize_url(issuer_url: &str, client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}/protocol/openid-connect/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        issuer_url.trim_end_matches('/'),
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode("openid email profile"),
        state
    )
}

/// Token endpoint success body.
///
/// Keycloak reports `expires_in`; some providers send an absolute
/// `expires_at` instead.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenResponse {
    /// Convert to a grant with an absolute expiry computed from `now`.
    pub fn into_grant(self, now: i64) -> Result<TokenGrant, SessionError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => clamp_epoch_secs(at),
            (None, Some(secs)) => clamp_epoch_secs(now.saturating_add(secs)),
            (None, None) => {
                return Err(SessionError::UnknownProviderError(
                    "Token response carries no expiry".to_string(),
                ))
            }
        };

        Ok(TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

/// OAuth error body (`{"error": "invalid_grant", ...}`).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

impl From<UserInfo> for Identity {
    fn from(info: UserInfo) -> Self {
        Identity {
            subject: info.sub,
            name: info.name,
            email: info.email,
            picture: info.picture,
        }
    }
}

/// Map a failed token endpoint response onto the session error taxonomy.
///
/// Server-side trouble and rate limiting are transient; `invalid_grant`
/// means the refresh token is dead; anything else is unexpected and ends
/// the session.
pub fn classify_token_error(status: StatusCode, body: &str) -> SessionError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(status = %status, "Identity provider unavailable");
        return SessionError::TransientNetworkFailure(format!("HTTP {}", status));
    }

    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) if err.error == "invalid_grant" => SessionError::RefreshTokenRevoked,
        Ok(err) => SessionError::UnknownProviderError(format!(
            "HTTP {}: {}{}",
            status,
            err.error,
            err.error_description
                .map(|d| format!(" ({})", d))
                .unwrap_or_default()
        )),
        Err(_) => SessionError::UnknownProviderError(format!("HTTP {}", status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_grant() {
        let err = classify_token_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Token is not active"}"#,
        );
        assert_eq!(err, SessionError::RefreshTokenRevoked);
        assert!(err.is_permanent());
    }

    #[test]
    fn test_classify_server_errors_are_transient() {
        for status in [
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            let err = classify_token_error(status, "");
            assert!(!err.is_permanent(), "{status} should be transient");
        }
    }

    #[test]
    fn test_classify_other_rejections() {
        let err = classify_token_error(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#);
        assert!(matches!(err, SessionError::UnknownProviderError(ref m) if m.contains("invalid_client")));

        let err = classify_token_error(StatusCode::FORBIDDEN, "<html>nope</html>");
        assert!(matches!(err, SessionError::UnknownProviderError(_)));
    }

    #[test]
    fn test_token_response_relative_expiry() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":300}"#).unwrap();
        let grant = body.into_grant(1_000).unwrap();
        assert_eq!(grant.expires_at, 1_300);
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_token_response_absolute_expiry_wins() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","expires_in":300,"expires_at":5000,"refresh_token":"r"}"#,
        )
        .unwrap();
        let grant = body.into_grant(1_000).unwrap();
        assert_eq!(grant.expires_at, 5_000);
        assert_eq!(grant.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_token_response_huge_expiry_saturates() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","expires_in":9223372036854775807}"#,
        )
        .unwrap();
        let grant = body.into_grant(1_700_000_000).unwrap();
        assert_eq!(grant.expires_at, clamp_epoch_secs(i64::MAX));
        assert!(grant.expires_at > 1_700_000_000);

        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","expires_at":-9223372036854775808}"#,
        )
        .unwrap();
        assert_eq!(
            body.into_grant(0).unwrap().expires_at,
            clamp_epoch_secs(i64::MIN)
        );
    }

    #[test]
    fn test_token_response_without_expiry() {
        let body: TokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        assert!(matches!(
            body.into_grant(0),
            Err(SessionError::UnknownProviderError(_))
        ));
    }

    #[test]
    fn test_authorize_url() {
        let url = authorize_url(
            "https://sso.example.com/realms/console/",
            "console-ui",
            "http://localhost:3005/auth/oauth/callback",
            "abc",
        );

        assert!(url.starts_with(
            "https://sso.example.com/realms/console/protocol/openid-connect/auth?"
        ));
        assert!(url.contains("client_id=console-ui"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3005%2Fauth%2Foauth%2Fcallback"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.ends_with("&state=abc"));
    }
}
