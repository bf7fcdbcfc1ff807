// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence seam for finalized credential records.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::models::CredentialRecord;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Where the session manager writes each record after a transition.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn load(&self, session_id: &str) -> Result<Option<CredentialRecord>, StoreError>;

    async fn save(&self, session_id: &str, record: &CredentialRecord) -> Result<(), StoreError>;

    async fn remove(&self, session_id: &str) -> Result<(), StoreError>;
}

/// Process-local store backed by a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    records: Arc<DashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted sessions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, session_id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.get(session_id).map(|r| r.clone()))
    }

    async fn save(&self, session_id: &str, record: &CredentialRecord) -> Result<(), StoreError> {
        self.records.insert(session_id.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        self.records.remove(session_id);
        Ok(())
    }
}
