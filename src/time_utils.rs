// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for token timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Clamp seconds since epoch into the range `DateTime<Utc>` can represent.
pub fn clamp_epoch_secs(secs: i64) -> i64 {
    secs.clamp(
        DateTime::<Utc>::MIN_UTC.timestamp(),
        DateTime::<Utc>::MAX_UTC.timestamp(),
    )
}

/// Convert seconds since epoch to UTC, saturating at the representable range.
pub fn from_epoch_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(clamp_epoch_secs(secs), 0).unwrap_or_default()
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}
