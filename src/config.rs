// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A single `CONSOLE_SECRET` is expanded with HKDF into the keys used for
//! session cookies and OAuth state signing.

use hkdf::Hkdf;
use sha2::Sha256;
use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// OIDC realm URL, e.g. `https://sso.example.com/realms/console`
    pub oidc_issuer_url: String,
    /// OIDC client ID (public)
    pub oidc_client_id: String,
    /// Console REST API base URL
    pub console_api_url: String,
    /// Frontend URL for CORS and default redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Refresh this many seconds before the access token expires
    pub refresh_margin_secs: i64,
    /// How long a request waits for an in-flight refresh
    pub refresh_timeout_secs: u64,
    /// Session cookie lifetime
    pub session_max_age_secs: i64,

    // --- Secrets ---
    /// OIDC client secret
    pub oidc_client_secret: String,
    /// HS256 key for session cookies (derived)
    pub session_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter (derived)
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        let (session_signing_key, oauth_state_key) =
            derive_keys(b"test_console_secret_32_bytes!!!!").unwrap_or_default();
        Self {
            oidc_issuer_url: "http://localhost:8180/realms/console".to_string(),
            oidc_client_id: "test_client_id".to_string(),
            console_api_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 3005,
            refresh_margin_secs: 30,
            refresh_timeout_secs: 10,
            session_max_age_secs: 30 * 24 * 60 * 60,
            oidc_client_secret: "test_secret".to_string(),
            session_signing_key,
            oauth_state_key,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret = env::var("CONSOLE_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("CONSOLE_SECRET"))?;
        if secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "CONSOLE_SECRET",
                "must be at least 32 bytes".to_string(),
            ));
        }
        let (session_signing_key, oauth_state_key) = derive_keys(secret.as_bytes())?;

        Ok(Self {
            oidc_issuer_url: env::var("OIDC_ISSUER_URL")
                .map_err(|_| ConfigError::Missing("OIDC_ISSUER_URL"))?,
            oidc_client_id: env::var("OIDC_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("OIDC_CLIENT_ID"))?,
            console_api_url: env::var("CONSOLE_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: parse_or("PORT", 3005)?,
            refresh_margin_secs: parse_or("REFRESH_MARGIN_SECS", 30)?,
            refresh_timeout_secs: parse_or("REFRESH_TIMEOUT_SECS", 10)?,
            session_max_age_secs: parse_or("SESSION_MAX_AGE_SECS", 30 * 24 * 60 * 60)?,

            oidc_client_secret: env::var("OIDC_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("OIDC_CLIENT_SECRET"))?,
            session_signing_key,
            oauth_state_key,
        })
    }
}

/// Read a numeric variable, falling back to `default` when unset.
fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Expand the console secret into (session signing key, OAuth state key).
fn derive_keys(secret: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ConfigError> {
    let hk = Hkdf::<Sha256>::new(None, secret);
    let mut session = vec![0u8; 32];
    let mut state = vec![0u8; 32];
    hk.expand(b"console-session/cookie", &mut session)
        .and_then(|_| hk.expand(b"console-session/oauth-state", &mut state))
        .map_err(|e| ConfigError::Invalid("CONSOLE_SECRET", e.to_string()))?;
    Ok((session, state))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
