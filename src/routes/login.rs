// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-cluster login page resolution.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::models::LoginPage;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/kafka/{kafka_id}/login", get(login_page))
}

#[derive(Deserialize)]
pub struct LoginParams {
    #[serde(default, rename = "callbackUrl")]
    callback_url: Option<String>,
}

/// Which sign-in flow to show for a cluster; unknown clusters go home.
async fn login_page(
    State(state): State<Arc<AppState>>,
    Path(kafka_id): Path<String>,
    Query(params): Query<LoginParams>,
) -> Result<Response> {
    let clusters = state.clusters.list(None).await?;

    match LoginPage::resolve(&clusters, &kafka_id, params.callback_url) {
        Some(page) => {
            tracing::debug!(kafka_id = %kafka_id, provider = ?page.provider, "Resolved login provider");
            Ok(Json(page).into_response())
        }
        None => Ok(Redirect::temporary("/").into_response()),
    }
}
