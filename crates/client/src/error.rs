// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the client crate.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The call is not valid in the current state.
    #[error("{0}")]
    StateViolation(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
