// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pusher Channels (protocol 7) wire frames.
//!
//! Every frame is a JSON object of the shape:
//! - `event`: event name (required)
//! - `channel`: channel the event belongs to (optional)
//! - `data`: payload, either an object or a JSON-encoded string
//!
//! Control events use the `pusher:` and `pusher_internal:` prefixes. Anything
//! else is an application event and passes through unmodified.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Protocol revision sent in the connection URL.
pub const PROTOCOL_VERSION: u8 = 7;

/// Value of the `Sec-WebSocket-Protocol` handshake header.
pub const SUBPROTOCOL: &str = "pusher-channels-protocol-7";

/// Channel name prefixes that require an authenticated subscription.
pub const RESTRICTED_PREFIXES: [&str; 2] = ["private-", "presence-"];

/// Control event names.
pub mod events {
    pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
    pub const PING: &str = "pusher:ping";
    pub const PONG: &str = "pusher:pong";
    pub const SUBSCRIBE: &str = "pusher:subscribe";
    pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";
    pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
    pub const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";
    pub const ERROR: &str = "pusher:error";
}

/// Returns true if subscribing to `channel` needs a token from the auth endpoint.
pub fn is_restricted_channel(channel: &str) -> bool {
    RESTRICTED_PREFIXES
        .iter()
        .any(|prefix| channel.starts_with(prefix))
}

/// Classification of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    ConnectionEstablished,
    Ping,
    Pong,
    SubscriptionSucceeded,
    SubscriptionError,
    Error,
    /// Not a control event; routed to the subscription filter.
    Application,
}

impl FrameKind {
    /// Classifies an event name.
    pub fn of(event: &str) -> Self {
        match event {
            events::CONNECTION_ESTABLISHED => FrameKind::ConnectionEstablished,
            events::PING => FrameKind::Ping,
            events::PONG => FrameKind::Pong,
            events::SUBSCRIPTION_SUCCEEDED => FrameKind::SubscriptionSucceeded,
            events::SUBSCRIPTION_ERROR => FrameKind::SubscriptionError,
            events::ERROR => FrameKind::Error,
            _ => FrameKind::Application,
        }
    }

    /// Returns true for protocol-level events.
    pub fn is_control(self) -> bool {
        self != FrameKind::Application
    }
}

/// A decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Payload. `Null` when the frame carried no data; a string only when the
    /// wire value was a string that is not itself valid JSON.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Frame {
    /// Creates a frame with no channel and no data.
    pub fn new(event: impl Into<String>) -> Self {
        Frame {
            event: event.into(),
            channel: None,
            data: Value::Null,
        }
    }

    /// Sets the channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Creates the `pusher:pong` reply.
    pub fn pong() -> Self {
        Frame::new(events::PONG)
    }

    /// Creates a client keepalive `pusher:ping`.
    pub fn ping() -> Self {
        Frame::new(events::PING).with_data(Value::Object(Map::new()))
    }

    /// Classifies this frame.
    pub fn kind(&self) -> FrameKind {
        FrameKind::of(&self.event)
    }

    /// Returns the payload as a map, if it is one.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// Decodes a raw text frame.
    ///
    /// A string `data` field is parsed again as JSON (servers double-encode
    /// payloads); if that inner parse fails the string is kept as-is.
    pub fn decode(raw: &str) -> Result<Frame> {
        let value: Value = serde_json::from_str(raw).map_err(Error::MalformedFrame)?;
        let Value::Object(mut map) = value else {
            return Err(Error::NotAnObject);
        };

        let event = match map.remove("event") {
            Some(Value::String(event)) => event,
            _ => return Err(Error::MissingEvent),
        };
        let channel = match map.remove("channel") {
            Some(Value::String(channel)) => Some(channel),
            _ => None,
        };
        let data = map.remove("data").map(unwrap_data).unwrap_or(Value::Null);

        Ok(Frame {
            event,
            channel,
            data,
        })
    }

    /// Serializes the frame to its wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Encodes an outbound frame from an event name and payload.
pub fn encode(event: &str, data: Value) -> Result<String> {
    Frame::new(event).with_data(data).to_json()
}

fn unwrap_data(data: Value) -> Value {
    match data {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(inner) => inner,
            Err(_) => Value::String(text),
        },
        other => other,
    }
}

/// Payload of a `pusher:subscribe` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub channel: String,
    /// Signature from the auth endpoint; only present for restricted channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl SubscribeRequest {
    /// Creates a request for a public channel.
    pub fn public(channel: impl Into<String>) -> Self {
        SubscribeRequest {
            channel: channel.into(),
            auth: None,
        }
    }

    /// Creates a request carrying an auth token.
    pub fn authorized(channel: impl Into<String>, auth: impl Into<String>) -> Self {
        SubscribeRequest {
            channel: channel.into(),
            auth: Some(auth.into()),
        }
    }

    /// Builds the `pusher:subscribe` frame.
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::new(events::SUBSCRIBE).with_data(serde_json::to_value(self)?))
    }

    /// Serializes the `pusher:subscribe` frame.
    pub fn to_json(&self) -> Result<String> {
        self.to_frame()?.to_json()
    }

    /// Reads a subscribe request back out of a decoded frame.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.event != events::SUBSCRIBE {
            return None;
        }
        serde_json::from_value(frame.data.clone()).ok()
    }
}

/// Payload of a `pusher:unsubscribe` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub channel: String,
}

impl UnsubscribeRequest {
    pub fn new(channel: impl Into<String>) -> Self {
        UnsubscribeRequest {
            channel: channel.into(),
        }
    }

    /// Serializes the `pusher:unsubscribe` frame.
    pub fn to_json(&self) -> Result<String> {
        Frame::new(events::UNSUBSCRIBE)
            .with_data(serde_json::to_value(self)?)
            .to_json()
    }
}

/// Handshake data from `pusher:connection_established`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEstablished {
    /// Session identifier; valid for this connection only.
    pub socket_id: String,
    /// Server-suggested inactivity interval in seconds.
    pub activity_timeout: Option<u64>,
}

impl ConnectionEstablished {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let socket_id = frame
            .data
            .get("socket_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingField {
                event: frame.event.clone(),
                field: "socket_id",
            })?;

        Ok(ConnectionEstablished {
            socket_id: socket_id.to_string(),
            activity_timeout: frame.data.get("activity_timeout").and_then(Value::as_u64),
        })
    }
}

/// Error details from `pusher:error` or `pusher:subscription_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub message: String,
    pub code: Option<u16>,
}

impl ProtocolError {
    pub fn from_frame(frame: &Frame) -> Self {
        let message = match &frame.data {
            Value::String(text) => Some(text.clone()),
            data => ["message", "error", "type"]
                .iter()
                .find_map(|key| data.get(key).and_then(Value::as_str))
                .map(str::to_string),
        }
        .unwrap_or_else(|| format!("{} without details", frame.event));

        let code = ["code", "status"]
            .iter()
            .find_map(|key| frame.data.get(key).and_then(Value::as_u64))
            .and_then(|code| u16::try_from(code).ok());

        ProtocolError { message, code }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
