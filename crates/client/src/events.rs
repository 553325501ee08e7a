// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events delivered to consumers.

use crate::state::ConnectionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// Handshake completed with a fresh session id.
    Connected { socket_id: String },
    /// The server confirmed the subscription.
    Subscribed { channel: String },
    /// Auth failed or the server rejected the subscription. It is retried on
    /// the next connection.
    SubscriptionError { channel: String, message: String },
    /// Advisory error: transport failure, `pusher:error`, dropped frame.
    Error(String),
}
