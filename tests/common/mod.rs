// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::Utc;
use console_session::config::Config;
use console_session::error::SessionError;
use console_session::middleware::auth::{create_session_jwt, SESSION_COOKIE};
use console_session::models::{CredentialRecord, Identity, KafkaCluster, LoginResult, TokenGrant};
use console_session::routes::create_router;
use console_session::services::store::StoreError;
use console_session::services::{
    ClusterDirectory, CredentialStore, IdentityProvider, MemoryCredentialStore, RefreshPolicy,
    SessionTokenManager,
};
use console_session::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake identity provider answers refresh requests.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Issue new tokens; rotate the refresh token if `rotate`.
    Grant { rotate: bool },
    /// `invalid_grant`
    Revoked,
    /// IdP down
    Transient,
}

/// In-process identity provider with a call counter.
pub struct FakeIdp {
    calls: AtomicUsize,
    behavior: Mutex<RefreshBehavior>,
    delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl FakeIdp {
    pub fn new(behavior: RefreshBehavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior: Mutex::new(behavior),
            delay: Mutex::new(None),
        })
    }

    pub fn granting() -> Arc<Self> {
        Self::new(RefreshBehavior::Grant { rotate: false })
    }

    /// Number of refresh calls received so far.
    pub fn refresh_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_behavior(&self, behavior: RefreshBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Make every refresh take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdp {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, SessionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            RefreshBehavior::Grant { rotate } => Ok(TokenGrant {
                access_token: format!("access-{}", n),
                refresh_token: rotate.then(|| format!("refresh-{}", n)),
                expires_at: Utc::now().timestamp() + 3600,
            }),
            RefreshBehavior::Revoked => Err(SessionError::RefreshTokenRevoked),
            RefreshBehavior::Transient => Err(SessionError::TransientNetworkFailure(
                "HTTP 503 Service Unavailable".to_string(),
            )),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<LoginResult, SessionError> {
        if code == "bad-code" {
            return Err(SessionError::UnknownProviderError(
                "HTTP 400: invalid_request".to_string(),
            ));
        }
        Ok(login_result(3600))
    }
}

/// Credential store whose saves after the first take `delay`.
#[allow(dead_code)]
pub struct SlowStore {
    inner: MemoryCredentialStore,
    saves: AtomicUsize,
    delay: Duration,
}

#[allow(dead_code)]
impl SlowStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCredentialStore::new(),
            saves: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl CredentialStore for SlowStore {
    async fn load(&self, session_id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        self.inner.load(session_id).await
    }

    async fn save(&self, session_id: &str, record: &CredentialRecord) -> Result<(), StoreError> {
        if self.saves.fetch_add(1, Ordering::SeqCst) > 0 {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.save(session_id, record).await
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        self.inner.remove(session_id).await
    }
}

/// Identity every fake login carries.
#[allow(dead_code)]
pub fn test_identity() -> Identity {
    Identity {
        subject: "user-123".to_string(),
        name: Some("Test User".to_string()),
        email: Some("test@example.com".to_string()),
        picture: None,
    }
}

/// Login result whose access token expires `expires_in` seconds from now.
#[allow(dead_code)]
pub fn login_result(expires_in: i64) -> LoginResult {
    LoginResult {
        access_token: "login-access".to_string(),
        refresh_token: Some("refresh-0".to_string()),
        expires_at: Utc::now().timestamp() + expires_in,
        identity: test_identity(),
    }
}

/// Session manager over `idp` with an in-memory store.
#[allow(dead_code)]
pub fn test_manager(idp: Arc<FakeIdp>, policy: RefreshPolicy) -> SessionTokenManager {
    SessionTokenManager::new(idp, Arc::new(MemoryCredentialStore::new()), policy)
}

/// Clusters served by the offline directory.
#[allow(dead_code)]
pub fn test_clusters() -> Vec<KafkaCluster> {
    serde_json::from_value(serde_json::json!([
        {
            "id": "k-oauth",
            "attributes": { "name": "prod" },
            "meta": { "authentication": { "method": "oauth" } }
        },
        {
            "id": "k-basic",
            "attributes": { "name": "staging" },
            "meta": { "authentication": { "method": "basic" } }
        },
        {
            "id": "k-anon",
            "attributes": { "name": "dev" }
        },
        {
            "id": "k-scram",
            "attributes": { "name": "legacy" },
            "meta": { "authentication": { "method": "scram-sha-512" } }
        }
    ]))
    .expect("Failed to build test clusters")
}

/// Create a test app with offline mock dependencies.
/// Returns the router, the shared state and the fake IdP.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeIdp>) {
    create_test_app_with(test_clusters())
}

#[allow(dead_code)]
pub fn create_test_app_with(clusters: Vec<KafkaCluster>) -> (axum::Router, Arc<AppState>, Arc<FakeIdp>) {
    let config = Config::test_default();
    let idp = FakeIdp::granting();

    let sessions = test_manager(idp.clone(), RefreshPolicy::from_config(&config));

    let state = Arc::new(AppState {
        config,
        idp: idp.clone(),
        sessions,
        clusters: ClusterDirectory::new_fixed(clusters),
    });

    (create_router(state.clone()), state, idp)
}

/// `Cookie` header value for a session.
#[allow(dead_code)]
pub fn session_cookie(state: &AppState, session_id: &str) -> String {
    let jwt = create_session_jwt(session_id, &state.config.session_signing_key, 3600)
        .expect("Failed to create session JWT");
    format!("{}={}", SESSION_COOKIE, jwt)
}
