// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network reachability signal.
//!
//! One monitor is shared process-wide; every client takes its own
//! subscription and drops it on teardown. Platform glue (or the TCP probe
//! below) reports availability changes through [`Reachability::set_available`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound for a single probe connect.
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared availability flag with change notification.
#[derive(Debug, Clone)]
pub struct Reachability {
    tx: Arc<watch::Sender<bool>>,
}

impl Reachability {
    /// Creates an independent monitor.
    pub fn new(available: bool) -> Self {
        let (tx, _rx) = watch::channel(available);
        Reachability { tx: Arc::new(tx) }
    }

    /// The process-wide monitor. Starts out available.
    pub fn shared() -> Reachability {
        static SHARED: OnceLock<Reachability> = OnceLock::new();
        SHARED.get_or_init(|| Reachability::new(true)).clone()
    }

    /// Current availability.
    #[cfg(test)]
    pub fn is_available(&self) -> bool {
        *self.tx.borrow()
    }

    /// Reports availability. Subscribers are only woken on an actual change.
    ///
    /// Returns true if the value changed.
    pub fn set_available(&self, available: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == available {
                false
            } else {
                *current = available;
                true
            }
        })
    }

    /// Subscribes to changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Number of live subscriptions.
    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Periodically probes `target` (`host:port`) over TCP and reports the
    /// result, until `cancel` fires.
    pub fn spawn_tcp_probe(
        &self,
        target: String,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let reachability = self.clone();
        tokio::spawn(async move {
            loop {
                let probe = TcpStream::connect(target.as_str());
                let reachable = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = tokio::time::timeout(PROBE_CONNECT_TIMEOUT.min(interval), probe) => {
                        matches!(result, Ok(Ok(_)))
                    }
                };
                if reachability.set_available(reachable) {
                    tracing::info!(target = %target, reachable, "reachability changed");
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        })
    }
}

impl Default for Reachability {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
#[path = "reachability_tests.rs"]
mod tests;
