// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential records held by the session token manager.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;
use crate::time_utils::from_epoch_secs;

/// Identity claims captured at login.
///
/// The IdP does not reissue these on refresh, so they are carried forward
/// unchanged for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier (`sub`)
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Avatar URL
    pub picture: Option<String>,
}

/// Tokens and claims returned by the IdP on initial authentication.
#[derive(Clone)]
pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds since epoch
    pub expires_at: i64,
    pub identity: Identity,
}

impl fmt::Debug for LoginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResult")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity)
            .finish()
    }
}

/// New tokens issued by the IdP token endpoint on refresh.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present only when the IdP rotates the refresh token.
    pub refresh_token: Option<String>,
    /// Seconds since epoch
    pub expires_at: i64,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// How a record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    /// Minted by a login (the `Fresh` state).
    Login,
    /// Minted by a successful refresh (the `Refreshed` state).
    Refresh,
}

/// Lifecycle state of a session's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Access token is inside its validity window.
    Valid,
    /// Within the refresh margin of `expires_at`, or past it.
    Expiring,
    /// A refresh for this record is in flight.
    Refreshing,
    /// Terminal; only a new login recovers.
    Failed,
}

/// One session's credential set.
///
/// Records are immutable once built. The session manager replaces the whole
/// record on every transition; nothing outside this crate can edit fields.
#[derive(Clone)]
pub struct CredentialRecord {
    pub(crate) access_token: Option<String>,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_at: i64,
    pub(crate) identity: Identity,
    pub(crate) error: Option<SessionError>,
    pub(crate) generation: u64,
    pub(crate) origin: RecordOrigin,
}

impl CredentialRecord {
    pub(crate) fn from_login(login: LoginResult, generation: u64) -> Self {
        Self {
            access_token: Some(login.access_token),
            refresh_token: login.refresh_token,
            expires_at: login.expires_at,
            identity: login.identity,
            error: None,
            generation,
            origin: RecordOrigin::Login,
        }
    }

    /// Build the successor record from a refresh grant.
    ///
    /// Identity is copied forward; the refresh token is kept when the IdP
    /// did not rotate it.
    pub(crate) fn refreshed(&self, grant: TokenGrant, generation: u64) -> Self {
        Self {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: grant.expires_at,
            identity: self.identity.clone(),
            error: None,
            generation,
            origin: RecordOrigin::Refresh,
        }
    }

    /// Terminal record: tokens discarded, identity kept for display.
    pub(crate) fn failed(&self, error: SessionError, generation: u64) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: self.expires_at,
            identity: self.identity.clone(),
            error: Some(error),
            generation,
            origin: self.origin,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn origin(&self) -> RecordOrigin {
        self.origin
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Expiry as a UTC timestamp.
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        from_epoch_secs(self.expires_at)
    }

    /// True once `now` has reached `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at_utc()
    }

    /// State of this record in isolation (never `Refreshing`).
    pub fn state_at(&self, now: DateTime<Utc>, margin: Duration) -> CredentialState {
        if self.is_failed() {
            return CredentialState::Failed;
        }
        let refresh_at = self
            .expires_at_utc()
            .checked_sub_signed(margin)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if now >= refresh_at {
            return CredentialState::Expiring;
        }
        CredentialState::Valid
    }

    /// Compare the secret refresh token without exposing it.
    pub fn refresh_token_matches(&self, candidate: &str) -> bool {
        self.refresh_token.as_deref() == Some(candidate)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity)
            .field("error", &self.error)
            .field("generation", &self.generation)
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            subject: "user-1".to_string(),
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            picture: None,
        }
    }

    fn record(expires_at: i64) -> CredentialRecord {
        CredentialRecord::from_login(
            LoginResult {
                access_token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                expires_at,
                identity: identity(),
            },
            1,
        )
    }

    #[test]
    fn test_state_valid_outside_margin() {
        let now = Utc::now();
        let rec = record(now.timestamp() + 300);
        assert_eq!(rec.state_at(now, Duration::seconds(30)), CredentialState::Valid);
    }

    #[test]
    fn test_state_expiring_inside_margin() {
        let now = Utc::now();
        let rec = record(now.timestamp() + 10);
        assert_eq!(
            rec.state_at(now, Duration::seconds(30)),
            CredentialState::Expiring
        );
        assert!(!rec.is_expired_at(now));
    }

    #[test]
    fn test_state_expiring_when_past_expiry() {
        let now = Utc::now();
        let rec = record(now.timestamp() - 5);
        assert_eq!(
            rec.state_at(now, Duration::seconds(30)),
            CredentialState::Expiring
        );
        assert!(rec.is_expired_at(now));
    }

    #[test]
    fn test_far_future_expiry_is_valid() {
        let now = Utc::now();
        let rec = record(i64::MAX);
        assert_eq!(rec.state_at(now, Duration::seconds(30)), CredentialState::Valid);
        assert!(!rec.is_expired_at(now));
    }

    #[test]
    fn test_state_and_expiry_agree_at_boundary() {
        let now = Utc::now();
        let rec = record(now.timestamp());
        assert!(rec.is_expired_at(now));
        assert_eq!(
            rec.state_at(now, Duration::zero()),
            CredentialState::Expiring
        );
    }

    #[test]
    fn test_refreshed_keeps_identity_and_old_refresh_token() {
        let rec = record(100);
        let next = rec.refreshed(
            TokenGrant {
                access_token: "access-2".to_string(),
                refresh_token: None,
                expires_at: 400,
            },
            2,
        );

        assert_eq!(next.identity(), rec.identity());
        assert!(next.refresh_token_matches("refresh-1"));
        assert_eq!(next.access_token(), Some("access-2"));
        assert_eq!(next.origin(), RecordOrigin::Refresh);
        assert_eq!(next.generation(), 2);
    }

    #[test]
    fn test_refreshed_takes_rotated_refresh_token() {
        let next = record(100).refreshed(
            TokenGrant {
                access_token: "access-2".to_string(),
                refresh_token: Some("refresh-2".to_string()),
                expires_at: 400,
            },
            2,
        );
        assert!(next.refresh_token_matches("refresh-2"));
    }

    #[test]
    fn test_failed_discards_tokens() {
        let failed = record(100).failed(SessionError::RefreshTokenRevoked, 2);
        assert_eq!(failed.access_token(), None);
        assert!(!failed.has_refresh_token());
        assert_eq!(
            failed.state_at(Utc::now(), Duration::seconds(30)),
            CredentialState::Failed
        );
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", record(100));
        assert!(!rendered.contains("access-1"));
        assert!(!rendered.contains("refresh-1"));
        assert!(rendered.contains("<redacted>"));
    }
}
