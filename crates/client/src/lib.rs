// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! qs-client: realtime queue client over Pusher Channels
//!
//! [`QueueClient`] connects to a Pusher-compatible broker, subscribes to one
//! channel, keeps the connection alive across network loss, and maintains a
//! local projection of the remote queue.
//!
//! Collaborators are injected:
//! - [`Transport`]: the socket ([`WebSocketTransport`] in production)
//! - [`Authorizer`]: signs private and presence channel subscriptions
//! - [`Credentials`]: the local identity and auth bearer token
//! - [`Reachability`]: network availability

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod keepalive;
pub mod reachability;
pub mod reconnect;
pub mod state;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use auth::{AuthError, Authorizer, HttpAuthorizer, NoAuthorizer};
pub use client::QueueClient;
pub use config::{ClientConfig, ConfigError, Endpoint};
pub use credentials::{Credentials, StaticCredentials};
pub use error::{ClientError, Result};
pub use events::ClientEvent;
pub use reachability::Reachability;
pub use state::ConnectionState;
pub use subscription::Subscription;
pub use transport::{Transport, TransportError, TransportEvent, TransportResult, WebSocketTransport};

pub use qs_core::QueueItem;
