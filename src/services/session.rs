// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token manager.
//!
//! Owns every session's credential record and decides when to reuse or
//! refresh it. Records are swapped whole (`Arc<CredentialRecord>`) so readers
//! never observe a half-updated record.
//!
//! Refresh is single-flight: the first reader that finds a record inside the
//! refresh margin spawns one refresh future and parks it in `in_flight`,
//! tagged with the record's generation. Every other reader of that
//! generation joins the same shared future and gets the same record or the
//! same failure.
//!
//! Every transition that touches the credential store (login, refresh
//! install, logout, resume) runs under a per-session write lock, so the
//! store always ends up holding the record that is current in memory.
//!
//! ```text
//! establish() ──→ [Valid] ──(margin)──→ [Expiring] ──read──→ [Refreshing]
//!                    ▲                                     │      │
//!                    └──────────── success ────────────────┘      │
//!                                                   permanent failure
//!                                                                 ▼
//!                                                             [Failed]
//! ```

use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::Config;
use crate::error::{AppError, SessionError};
use crate::models::{CredentialRecord, CredentialState, LoginResult, SessionView};
use crate::services::idp::IdentityProvider;
use crate::services::store::CredentialStore;

/// Result every joined refresh caller receives.
pub type RefreshOutcome = Result<Arc<CredentialRecord>, SessionError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Per-session locks ordering in-memory swaps with their store writes.
type WriteLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Refresh currently running for one record generation.
struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

/// When to refresh, and how long a caller waits for one.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    /// Refresh once `now >= expires_at - margin`.
    pub margin: Duration,
    /// Caller-level bound on awaiting a refresh.
    pub timeout: std::time::Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            margin: Duration::seconds(30),
            timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl RefreshPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            margin: Duration::seconds(config.refresh_margin_secs),
            timeout: std::time::Duration::from_secs(config.refresh_timeout_secs),
        }
    }
}

/// Handle on an in-flight refresh.
///
/// Dropping it never cancels the refresh; it runs on its own task.
#[derive(Clone)]
pub struct RefreshHandle {
    future: SharedRefresh,
    timeout: std::time::Duration,
}

impl RefreshHandle {
    /// Wait for the refresh, giving up after the policy timeout.
    ///
    /// A timeout is reported as a transient failure; the stored record is
    /// untouched and the refresh keeps running.
    pub async fn wait(self) -> RefreshOutcome {
        match tokio::time::timeout(self.timeout, self.future).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::TransientNetworkFailure(
                "Refresh did not complete in time".to_string(),
            )),
        }
    }
}

/// Result of [`SessionTokenManager::current_credential`].
pub struct CredentialRead {
    record: Arc<CredentialRecord>,
    pending: Option<RefreshHandle>,
}

impl CredentialRead {
    /// The record current at read time. While a refresh is pending this is
    /// the previous record.
    pub fn record(&self) -> &Arc<CredentialRecord> {
        &self.record
    }

    pub fn into_record(self) -> Arc<CredentialRecord> {
        self.record
    }

    pub fn is_refreshing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn refresh_handle(&self) -> Option<RefreshHandle> {
        self.pending.clone()
    }

    /// Wait for the pending refresh, if any.
    ///
    /// Without a pending refresh this resolves immediately to the record read
    /// (or its error, for a failed session).
    pub async fn refreshed(self) -> RefreshOutcome {
        match self.pending {
            Some(handle) => handle.wait().await,
            None => match self.record.error() {
                Some(err) => Err(err.clone()),
                None => Ok(self.record),
            },
        }
    }
}

/// Owner of all session credential records.
#[derive(Clone)]
pub struct SessionTokenManager {
    idp: Arc<dyn IdentityProvider>,
    store: Arc<dyn CredentialStore>,
    records: Arc<DashMap<String, Arc<CredentialRecord>>>,
    in_flight: Arc<DashMap<String, InFlight>>,
    write_locks: WriteLocks,
    generations: Arc<AtomicU64>,
    policy: RefreshPolicy,
}

impl SessionTokenManager {
    pub fn new(
        idp: Arc<dyn IdentityProvider>,
        store: Arc<dyn CredentialStore>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            idp,
            store,
            records: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            write_locks: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
            policy,
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn write_lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .write_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Install the record minted by a login.
    ///
    /// A new login always wins: any prior record is replaced and a refresh
    /// still running for it will find its generation gone and discard its
    /// result.
    pub async fn establish(&self, session_id: &str, login: LoginResult) -> Arc<CredentialRecord> {
        let record = Arc::new(CredentialRecord::from_login(login, self.next_generation()));
        let _guard = self.write_lock(session_id).await;

        self.in_flight.remove(session_id);
        self.records
            .insert(session_id.to_string(), Arc::clone(&record));

        tracing::info!(
            session = session_tag(session_id),
            generation = record.generation(),
            subject = %record.identity().subject,
            "Session established (Fresh -> Valid)"
        );

        self.persist(session_id, &record).await;
        record
    }

    /// Read a session's credentials, starting a refresh if they are expiring.
    ///
    /// Never blocks on the IdP: the previous record is returned right away
    /// and the refresh (if any) is exposed through the returned read.
    /// Failed sessions are returned as-is and never trigger an IdP call.
    ///
    /// Inside a Tokio runtime the refresh is spawned and completes even if
    /// nobody awaits it. Called outside one, the refresh only makes progress
    /// while a caller awaits [`CredentialRead::refreshed`].
    pub fn current_credential(&self, session_id: &str) -> Option<CredentialRead> {
        let record = self
            .records
            .get(session_id)
            .map(|r| Arc::clone(r.value()))?;

        let pending = match record.state_at(Utc::now(), self.policy.margin) {
            CredentialState::Expiring => Some(self.begin_refresh(session_id, &record)),
            _ => None,
        };

        Some(CredentialRead { record, pending })
    }

    /// Current lifecycle state, including `Refreshing`.
    pub fn state(&self, session_id: &str) -> Option<CredentialState> {
        let record = self
            .records
            .get(session_id)
            .map(|r| Arc::clone(r.value()))?;

        let refreshing = self
            .in_flight
            .get(session_id)
            .is_some_and(|f| f.generation == record.generation());

        if refreshing && !record.is_failed() {
            return Some(CredentialState::Refreshing);
        }
        Some(record.state_at(Utc::now(), self.policy.margin))
    }

    /// Redeem a record's refresh token for its successor.
    ///
    /// Pure with respect to manager state: the caller decides whether to
    /// install the result. Identity is copied forward, and the refresh token
    /// is retained when the IdP does not rotate it.
    pub async fn refresh(&self, record: &CredentialRecord) -> Result<CredentialRecord, SessionError> {
        if let Some(err) = record.error() {
            return Err(err.clone());
        }

        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or(SessionError::MissingRefreshToken)?;

        let grant = self.idp.refresh(refresh_token).await?;
        Ok(record.refreshed(grant, self.next_generation()))
    }

    /// Project a record for the UI and request layer.
    pub fn present(&self, record: &CredentialRecord) -> SessionView {
        SessionView::from_record(record, Utc::now())
    }

    /// Session view for the session read endpoint.
    ///
    /// Waits for a pending refresh only when the current token is already
    /// expired; otherwise the still-valid token is shown immediately.
    pub async fn session_view(&self, session_id: &str) -> SessionView {
        let Some(read) = self.current_credential(session_id) else {
            return SessionView::anonymous();
        };

        if read.is_refreshing() && read.record().is_expired_at(Utc::now()) {
            let previous = Arc::clone(read.record());
            return match read.refreshed().await {
                Ok(record) => self.present(&record),
                Err(err) if err.is_permanent() => SessionView {
                    access_token: None,
                    error: Some(err.code().to_string()),
                },
                Err(_) => self.present(&previous),
            };
        }

        self.present(read.record())
    }

    /// Credentials usable for an outbound request right now.
    ///
    /// While the token is merely inside the refresh margin the current record
    /// is returned and the refresh runs in the background. Once it is past
    /// expiry the caller waits (bounded by the policy timeout).
    pub async fn valid_credential(
        &self,
        session_id: &str,
    ) -> crate::error::Result<Arc<CredentialRecord>> {
        let read = self
            .current_credential(session_id)
            .ok_or(AppError::Unauthorized)?;

        if let Some(err) = read.record().error() {
            return Err(err.clone().into());
        }

        if read.is_refreshing() && read.record().is_expired_at(Utc::now()) {
            return Ok(read.refreshed().await?);
        }

        Ok(read.into_record())
    }

    /// Forget a session entirely.
    ///
    /// A refresh still in flight for the session finds its record gone and
    /// writes nothing back to the store.
    pub async fn logout(&self, session_id: &str) {
        let guard = self.write_lock(session_id).await;

        self.in_flight.remove(session_id);
        self.records.remove(session_id);

        if let Err(e) = self.store.remove(session_id).await {
            tracing::warn!(error = %e, "Failed to remove persisted session, continuing anyway");
        }

        drop(guard);
        self.write_locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);

        tracing::info!(session = session_tag(session_id), "Session logged out");
    }

    /// Load a persisted record into memory if it is not there yet.
    ///
    /// Returns whether the session is known afterwards.
    pub async fn resume(&self, session_id: &str) -> bool {
        if self.records.contains_key(session_id) {
            return true;
        }

        let _guard = self.write_lock(session_id).await;
        if self.records.contains_key(session_id) {
            return true;
        }

        match self.store.load(session_id).await {
            Ok(Some(record)) => {
                self.generations
                    .fetch_max(record.generation(), Ordering::Relaxed);
                self.records
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(record));
                tracing::debug!(session = session_tag(session_id), "Session resumed from store");
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted session");
                false
            }
        }
    }

    // ─── Single-flight refresh ───────────────────────────────────────────────

    fn begin_refresh(&self, session_id: &str, seen: &Arc<CredentialRecord>) -> RefreshHandle {
        let future = match self.in_flight.entry(session_id.to_string()) {
            Entry::Occupied(entry) if entry.get().generation == seen.generation() => {
                entry.get().future.clone()
            }
            entry => {
                // A refresh can land between our read and taking the entry;
                // its record is already current and must not be refreshed
                // again with a possibly rotated-away token.
                let current = self
                    .records
                    .get(session_id)
                    .map(|r| Arc::clone(r.value()));
                match current {
                    Some(current) if current.generation() == seen.generation() => {}
                    Some(current) => return self.settled(Ok(current)),
                    None => return self.settled(Ok(Arc::clone(seen))),
                }

                let future = self
                    .clone()
                    .run_refresh(session_id.to_string(), Arc::clone(seen))
                    .boxed()
                    .shared();
                let in_flight = InFlight {
                    generation: seen.generation(),
                    future: future.clone(),
                };
                match entry {
                    Entry::Occupied(mut e) => {
                        e.insert(in_flight);
                    }
                    Entry::Vacant(e) => {
                        e.insert(in_flight);
                    }
                }

                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(future.clone());
                    }
                    Err(_) => {
                        tracing::debug!(
                            session = session_tag(session_id),
                            "No runtime, refresh runs when awaited"
                        );
                    }
                }
                future
            }
        };

        RefreshHandle {
            future,
            timeout: self.policy.timeout,
        }
    }

    fn settled(&self, outcome: RefreshOutcome) -> RefreshHandle {
        RefreshHandle {
            future: future::ready(outcome).boxed().shared(),
            timeout: self.policy.timeout,
        }
    }

    async fn run_refresh(self, session_id: String, seen: Arc<CredentialRecord>) -> RefreshOutcome {
        let tag = session_tag(&session_id);
        tracing::info!(
            session = tag,
            generation = seen.generation(),
            "Access token expiring, refreshing"
        );

        let outcome = match self.refresh(&seen).await {
            Ok(next) => {
                let next = Arc::new(next);
                if self.commit(&session_id, seen.generation(), Arc::clone(&next)).await {
                    tracing::info!(
                        session = tag,
                        generation = next.generation(),
                        "Token refreshed (Refreshed -> Valid)"
                    );
                    Ok(next)
                } else {
                    tracing::info!(session = tag, "Session replaced during refresh, discarding result");
                    Ok(self
                        .records
                        .get(&session_id)
                        .map(|r| Arc::clone(r.value()))
                        .unwrap_or(next))
                }
            }
            Err(err) if err.is_permanent() => {
                let failed = Arc::new(seen.failed(err.clone(), self.next_generation()));
                if self.commit(&session_id, seen.generation(), Arc::clone(&failed)).await {
                    tracing::warn!(
                        session = tag,
                        error = %err,
                        "Refresh failed permanently, session terminated"
                    );
                }
                Err(err)
            }
            Err(err) => {
                tracing::warn!(
                    session = tag,
                    error = %err,
                    "Transient refresh failure, will retry on next access"
                );
                Err(err)
            }
        };

        self.in_flight
            .remove_if(&session_id, |_, f| f.generation == seen.generation());

        outcome
    }

    /// Swap in `next` and persist it if the current record is still
    /// `expected_generation`.
    ///
    /// Holds the session's write lock across the store write, so a login or
    /// logout landing meanwhile is ordered after it and has the last word.
    async fn commit(
        &self,
        session_id: &str,
        expected_generation: u64,
        next: Arc<CredentialRecord>,
    ) -> bool {
        let _guard = self.write_lock(session_id).await;

        let installed = match self.records.get_mut(session_id) {
            Some(mut slot) if slot.generation() == expected_generation => {
                *slot = Arc::clone(&next);
                true
            }
            _ => false,
        };

        if installed {
            self.persist(session_id, &next).await;
        }
        installed
    }

    async fn persist(&self, session_id: &str, record: &CredentialRecord) {
        if let Err(e) = self.store.save(session_id, record).await {
            tracing::warn!(
                session = session_tag(session_id),
                error = %e,
                "Failed to persist session, continuing anyway"
            );
        }
    }
}

/// Short prefix of a session id, safe for logs.
fn session_tag(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
