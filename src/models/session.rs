// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outward-facing session view.

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::CredentialRecord;

/// What the UI and request layer get to see of a session.
///
/// A non-null `error` means "not authenticated, redirect to login". The
/// refresh token never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/api/generated/")
)]
pub struct SessionView {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

impl SessionView {
    /// View for a request that carries no session at all.
    pub fn anonymous() -> Self {
        Self {
            access_token: None,
            error: None,
        }
    }

    /// Project a record at the given instant.
    ///
    /// The access token is withheld once the record has failed or the token
    /// is past its expiry.
    pub fn from_record(record: &CredentialRecord, now: DateTime<Utc>) -> Self {
        if let Some(error) = record.error() {
            return Self {
                access_token: None,
                error: Some(error.code().to_string()),
            };
        }

        let access_token = if record.is_expired_at(now) {
            None
        } else {
            record.access_token().map(str::to_string)
        };

        Self {
            access_token,
            error: None,
        }
    }
}
