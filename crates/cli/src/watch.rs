// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `qsync watch`: stream a queue to the terminal.

use std::io::Write;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use qs_client::{ClientConfig, ClientEvent, QueueClient, Reachability, StaticCredentials};
use qs_core::QueueItem;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::WatchArgs;
use crate::display::{format_event, format_snapshot_json, format_snapshot_table};
use crate::env;
use crate::error::{Error, Result};

/// How often the broker host is probed for reachability.
const PROBE_INTERVAL: Duration = Duration::from_secs(10);

pub async fn run(args: WatchArgs) -> Result<()> {
    let path = crate::config_path(&args.config);
    let config = ClientConfig::load(&path)?;
    let token = args.token.clone().or_else(env::token);
    let credentials = Arc::new(StaticCredentials::new(args.owner_id, token));
    let target = probe_target(&config);

    let client = QueueClient::new(config, credentials)?;
    let cancel = CancellationToken::new();
    let probe = Reachability::shared().spawn_tcp_probe(target, PROBE_INTERVAL, cancel.clone());

    let (events, snapshots) = start(&client, &args.channel, &args.event)?;
    let outcome = stream(events, snapshots, args.json).await;

    cancel.cancel();
    if let Err(e) = probe.await {
        debug!(error = %e, "probe task ended abnormally");
    }
    // The actor is already gone after a terminal failure.
    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "disconnect skipped");
    }
    outcome
}

/// Subscribes and connects. The streams are taken before connecting so a
/// fast failure is not missed.
fn start(
    client: &QueueClient,
    channel: &str,
    event: &str,
) -> Result<(
    impl Stream<Item = ClientEvent>,
    impl Stream<Item = Arc<[QueueItem]>>,
)> {
    let events = client.events();
    let snapshots = client.snapshots();

    client.subscribe(channel, event)?;
    client.connect()?;
    info!(channel = %channel, event = %event, "watching");
    Ok((events, snapshots))
}

/// Prints events and snapshots until Ctrl-C or a terminal failure.
async fn stream(
    events: impl Stream<Item = ClientEvent>,
    snapshots: impl Stream<Item = Arc<[QueueItem]>>,
    json: bool,
) -> Result<()> {
    let mut events = pin!(events);
    let mut snapshots = pin!(snapshots);
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                info!("interrupted");
                return Ok(());
            }
            Some(event) = events.next() => {
                eprintln!("{}", format_event(&event));
                match event {
                    ClientEvent::StateChanged(state) if state.is_terminal() => {
                        let reason = last_error.take().unwrap_or_else(|| "gave up reconnecting".into());
                        return Err(Error::ConnectionFailed(reason));
                    }
                    ClientEvent::Error(message) => last_error = Some(message),
                    _ => {}
                }
            }
            Some(snapshot) = snapshots.next() => {
                print_snapshot(&snapshot, json)?;
            }
            else => return Ok(()),
        }
    }
}

fn print_snapshot(items: &[QueueItem], json: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    if json {
        writeln!(stdout, "{}", format_snapshot_json(items)?)?;
    } else {
        writeln!(stdout, "{}", format_snapshot_table(items))?;
    }
    stdout.flush()?;
    Ok(())
}

/// `host:port` of the broker, with the scheme's default port.
fn probe_target(config: &ClientConfig) -> String {
    let port = config.port.unwrap_or(if config.tls { 443 } else { 80 });
    format!("{}:{}", config.host.trim(), port)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
