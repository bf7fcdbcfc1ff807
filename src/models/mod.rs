// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod cluster;
pub mod credential;
pub mod session;

pub use cluster::{AuthenticationMethod, KafkaCluster, LoginPage, LoginProvider};
pub use credential::{
    CredentialRecord, CredentialState, Identity, LoginResult, RecordOrigin, TokenGrant,
};
pub use session::SessionView;
