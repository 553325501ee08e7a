// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Default config file when neither `--config` nor `QSYNC_CONFIG` is given.
pub const DEFAULT_CONFIG: &str = "qsync.toml";

/// Returns the value of `QSYNC_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    std::env::var(vars::QSYNC_CONFIG)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns the bearer token from `QSYNC_TOKEN` if set and non-empty.
pub fn token() -> Option<String> {
    std::env::var(vars::QSYNC_TOKEN)
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
