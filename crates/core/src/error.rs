// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for qs-core operations.

use thiserror::Error;

/// Errors produced while decoding or encoding protocol frames.
///
/// None of these are fatal to a connection: a frame that fails to decode is
/// dropped and processing continues with the next one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no string 'event' field")]
    MissingEvent,

    #[error("'{event}' frame is missing required field '{field}'")]
    MissingField { event: String, field: &'static str },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for qs-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
