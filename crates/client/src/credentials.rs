// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Identity capability injected into the client.
//!
//! The client never reads credentials from ambient storage; callers hand it an
//! implementation of [`Credentials`] instead.

/// Source of the local identity and the bearer token for the auth endpoint.
pub trait Credentials: Send + Sync {
    /// Numeric id of the current subscriber, used to scope queue removals.
    fn owner_id(&self) -> Option<i64>;

    /// Bearer token for the auth endpoint, read on every auth request.
    fn auth_token(&self) -> Option<String>;
}

/// Fixed credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCredentials {
    pub owner_id: Option<i64>,
    pub auth_token: Option<String>,
}

impl StaticCredentials {
    pub fn new(owner_id: Option<i64>, auth_token: Option<String>) -> Self {
        StaticCredentials {
            owner_id,
            auth_token,
        }
    }
}

impl Credentials for StaticCredentials {
    fn owner_id(&self) -> Option<i64> {
        self.owner_id
    }

    fn auth_token(&self) -> Option<String> {
        self.auth_token.clone()
    }
}
