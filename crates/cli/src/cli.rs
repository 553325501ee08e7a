// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  qsync check-config -c qsync.toml                  Validate a config
  qsync watch -c qsync.toml --channel queue.7 \\
      --event QueueUpdated                          Watch a public queue
  QSYNC_TOKEN=... qsync watch --channel private-queue.7 \\
      --event QueueUpdated --owner-id 7 --json      Watch a restricted queue";

#[derive(Parser)]
#[command(name = "qsync")]
#[command(version)]
#[command(about = "Realtime queue sync client for Pusher Channels brokers")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect, subscribe, and print queue snapshots until interrupted
    #[command(after_help = "Examples:\n  \
        qsync watch --channel queue.7 --event QueueUpdated          Table output\n  \
        qsync watch --channel queue.7 --event QueueUpdated --json   One JSON line per snapshot\n  \
        qsync watch --channel private-queue.7 --event E -t TOKEN    Restricted channel")]
    Watch(WatchArgs),

    /// Validate a config file and print the connection URL
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file (default: $QSYNC_CONFIG, then ./qsync.toml)
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Channel to subscribe to (private-/presence- channels need auth)
    #[arg(long)]
    pub channel: String,

    /// Application event carrying queue payloads
    #[arg(long)]
    pub event: String,

    /// Local identity; removals for other owners are ignored
    #[arg(long, value_name = "N")]
    pub owner_id: Option<i64>,

    /// Bearer token for the auth endpoint (default: $QSYNC_TOKEN)
    #[arg(long, short, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Print snapshots as JSON lines instead of a table
    #[arg(long)]
    pub json: bool,

    /// Log at debug level (ignored when RUST_LOG is set)
    #[arg(long, short)]
    pub verbose: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
