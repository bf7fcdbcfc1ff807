// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Console-Session API Server
//!
//! Serves login, session and token refresh endpoints for the messaging
//! cluster console.

use console_session::{
    config::Config,
    services::{
        ClusterDirectory, IdentityProvider, MemoryCredentialStore, OidcClient, RefreshPolicy,
        SessionTokenManager,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Console-Session API");

    let idp: Arc<dyn IdentityProvider> = Arc::new(OidcClient::new(
        &config.oidc_issuer_url,
        config.oidc_client_id.clone(),
        config.oidc_client_secret.clone(),
    ));
    tracing::info!(issuer = %config.oidc_issuer_url, "Identity provider configured");

    let policy = RefreshPolicy::from_config(&config);
    let sessions = SessionTokenManager::new(
        idp.clone(),
        Arc::new(MemoryCredentialStore::new()),
        policy,
    );
    tracing::info!(
        margin_secs = config.refresh_margin_secs,
        timeout_secs = config.refresh_timeout_secs,
        "Session token manager initialized"
    );

    let clusters = ClusterDirectory::new(&config.console_api_url);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        idp,
        sessions,
        clusters,
    });

    // Build router
    let app = console_session::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("console_session=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
