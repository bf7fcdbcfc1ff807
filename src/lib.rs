// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Console-Session: authentication backend for the messaging cluster console
//!
//! This crate owns the user's OAuth credentials on the server side: it
//! establishes sessions on login, refreshes access tokens against the
//! identity provider before they expire, and exposes a minimal session view
//! to the console UI.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{ClusterDirectory, IdentityProvider, SessionTokenManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub idp: Arc<dyn IdentityProvider>,
    pub sessions: SessionTokenManager,
    pub clusters: ClusterDirectory,
}
