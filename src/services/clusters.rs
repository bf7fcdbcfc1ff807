// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Console API client for the Kafka cluster list.

use crate::error::AppError;
use crate::models::cluster::{ClusterList, KafkaCluster};

/// Source of cluster metadata for the login page and the cluster selector.
#[derive(Clone)]
pub struct ClusterDirectory {
    http: reqwest::Client,
    base_url: String,
    /// Fixed cluster list used instead of the API (offline mode).
    fixed: Option<Vec<KafkaCluster>>,
}

impl ClusterDirectory {
    /// Create a directory backed by the console API at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            fixed: None,
        }
    }

    /// Create a directory that always returns `clusters` (for testing).
    pub fn new_fixed(clusters: Vec<KafkaCluster>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: String::new(),
            fixed: Some(clusters),
        }
    }

    /// List clusters, attaching the user's access token when there is one.
    pub async fn list(&self, access_token: Option<&str>) -> Result<Vec<KafkaCluster>, AppError> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }

        let mut request = self
            .http
            .get(format!("{}/api/kafkas", self.base_url))
            .query(&[("fields[kafkas]", "name")]);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ConsoleApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Cluster list request failed");
            return Err(AppError::ConsoleApi(format!("HTTP {}: {}", status, body)));
        }

        let list: ClusterList = response
            .json()
            .await
            .map_err(|e| AppError::ConsoleApi(format!("JSON parse error: {}", e)))?;

        tracing::debug!(count = list.data.len(), "Fetched cluster list");
        Ok(list.data)
    }
}
