// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! qsync - command-line front end for the queue sync client.
//!
//! `qsync watch` connects with a TOML config, subscribes to one channel and
//! prints every queue snapshot; `qsync check-config` validates a config.

mod cli;
mod display;
pub mod env;
pub mod error;
mod watch;

pub use cli::{Cli, Command, ConfigArgs, WatchArgs};
pub use error::{Error, Result};

use std::path::PathBuf;

use qs_client::ClientConfig;
use tracing_subscriber::EnvFilter;

/// Runs one command to completion.
pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Watch(args) => {
            init_logging(args.verbose);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch::run(args))
        }
        Command::CheckConfig { config } => {
            init_logging(false);
            check_config(&config)
        }
    }
}

/// `--config`, then `QSYNC_CONFIG`, then `./qsync.toml`.
pub fn config_path(args: &ConfigArgs) -> PathBuf {
    args.config
        .clone()
        .or_else(env::config_path)
        .unwrap_or_else(|| PathBuf::from(env::DEFAULT_CONFIG))
}

fn check_config(args: &ConfigArgs) -> Result<()> {
    let config = ClientConfig::load(&config_path(args))?;
    let endpoint = config.endpoint()?;
    println!("{}", endpoint.url);
    if let Some(auth) = config.auth_url()? {
        println!("auth: {}", auth);
    }
    Ok(())
}

/// Logs go to stderr so stdout carries only snapshots. `RUST_LOG` overrides
/// the level chosen by `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env(env::vars::RUST_LOG).unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
