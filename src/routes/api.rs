// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated API routes.

use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::AuthSession;
use crate::models::LoginProvider;
use crate::time_utils::{format_utc_rfc3339, from_epoch_secs};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/kafkas", get(list_clusters))
}

/// Identity claims of the signed-in user.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/api/generated/")
)]
pub struct MeResponse {
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    /// Access token expiry (RFC 3339)
    pub expires_at: String,
}

async fn me(Extension(auth): Extension<AuthSession>) -> Json<MeResponse> {
    Json(MeResponse {
        subject: auth.identity.subject,
        name: auth.identity.name,
        email: auth.identity.email,
        picture: auth.identity.picture,
        expires_at: format_utc_rfc3339(from_epoch_secs(auth.expires_at)),
    })
}

/// Entry in the cluster selector.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/api/generated/")
)]
pub struct ClusterSummary {
    pub id: String,
    pub name: Option<String>,
    pub login_provider: LoginProvider,
}

/// Cluster list fetched on the user's behalf.
async fn list_clusters(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<Vec<ClusterSummary>>> {
    let clusters = state.clusters.list(Some(&auth.access_token)).await?;

    Ok(Json(
        clusters
            .into_iter()
            .map(|c| ClusterSummary {
                login_provider: c.login_provider(),
                name: c.attributes.name,
                id: c.id,
            })
            .collect(),
    ))
}
