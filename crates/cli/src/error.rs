// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by the `qsync` command.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] qs_client::ConfigError),

    #[error(transparent)]
    Client(#[from] qs_client::ClientError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection failed: {0}\n  hint: run with --verbose for transport details")]
    ConnectionFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
