// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod clusters;
pub mod idp;
pub mod session;
pub mod store;

pub use clusters::ClusterDirectory;
pub use idp::{IdentityProvider, OidcClient};
pub use session::{CredentialRead, RefreshHandle, RefreshPolicy, SessionTokenManager};
pub use store::{CredentialStore, MemoryCredentialStore};
