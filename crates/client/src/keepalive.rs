// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Keepalive bookkeeping.
//!
//! The client sends `pusher:ping` on a fixed cadence. Any inbound frame
//! counts as proof of life, so an outstanding ping is cleared by whatever
//! arrives next, not only by `pusher:pong`.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct Keepalive {
    /// When the outstanding ping was sent.
    ping_sent_at: Option<Instant>,
}

impl Keepalive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a ping. An already outstanding ping keeps its timestamp.
    pub fn ping_sent(&mut self, now: Instant) {
        self.ping_sent_at.get_or_insert(now);
    }

    /// Records inbound traffic.
    pub fn frame_received(&mut self) {
        self.ping_sent_at = None;
    }

    pub fn is_awaiting_pong(&self) -> bool {
        self.ping_sent_at.is_some()
    }

    /// Returns true if the outstanding ping has gone unanswered for longer
    /// than `timeout`. Always false without a timeout.
    pub fn is_expired(&self, now: Instant, timeout: Option<Duration>) -> bool {
        match (self.ping_sent_at, timeout) {
            (Some(sent), Some(timeout)) => now.saturating_duration_since(sent) >= timeout,
            _ => false,
        }
    }

    /// When the outstanding ping times out, if there is one and a timeout.
    pub fn deadline(&self, timeout: Option<Duration>) -> Option<Instant> {
        Some(self.ping_sent_at? + timeout?)
    }

    pub fn reset(&mut self) {
        self.ping_sent_at = None;
    }
}

#[cfg(test)]
#[path = "keepalive_tests.rs"]
mod tests;
