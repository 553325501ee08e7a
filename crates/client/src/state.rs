// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle states.

use std::fmt;

/// State of the client connection. Owned by the client task; everyone else
/// only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected and not trying to.
    #[default]
    Disconnected,
    /// Opening the socket or waiting for the handshake.
    Connecting,
    /// Handshake done, no subscription in flight.
    Connected,
    /// Subscribe frame sent or auth in progress.
    Subscribing,
    /// Server confirmed the subscription.
    Subscribed,
    /// Transport lost; waiting for backoff or reachability.
    Reconnecting,
    /// Terminal. Deliberate disconnect, reconnect disabled or exhausted.
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }

    /// Returns true once the handshake completed on the current transport.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Subscribing | ConnectionState::Subscribed
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Failed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
