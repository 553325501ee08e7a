// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect pacing: exponential backoff with a cap and an optional retry limit.

use std::time::Duration;

/// Exponential backoff state for one reconnect cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    /// Maximum attempts per cycle (0 = unlimited).
    max_retries: u32,
    attempt: u32,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_retries: u32) -> Self {
        Backoff {
            initial,
            max,
            max_retries,
            attempt: 0,
            next: initial,
        }
    }

    /// Number of attempts made since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns true once the retry limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.max_retries > 0 && self.attempt >= self.max_retries
    }

    /// Records an attempt and returns how long to wait before making it.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.next.min(self.max);
        // Double for the next attempt, capped
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    /// Records an attempt made immediately (e.g. on a reachability change).
    pub fn record_immediate(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Starts a fresh cycle after a successful handshake.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next = self.initial;
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
