// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for WebSocket communication.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! A transport owns at most one socket. It never reconnects on its own;
//! once it reports [`TransportEvent::Closed`] or [`TransportEvent::Error`]
//! it is spent and the state machine builds a fresh one.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::Endpoint;

/// Close code reported when the peer vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code used for a deliberate client-side close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Opening the socket took longer than the connect timeout.
    #[error("connect timed out")]
    Timeout,

    /// The endpoint could not be turned into a handshake request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Inbound events produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket finished opening.
    Opened,
    /// The socket closed, cleanly or not.
    Closed { code: u16, reason: String },
    Text(String),
    Binary(Vec<u8>),
    /// The socket failed; the transport is closed afterwards.
    Error(String),
}

impl TransportEvent {
    /// Returns true if the transport is spent after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Closed { .. } | TransportEvent::Error(_))
    }
}

/// Transport trait for WebSocket-like communication.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations. `recv` must be cancel-safe:
/// the state machine races it against timers and commands.
pub trait Transport: Send + 'static {
    /// Opens the socket. A no-op when already open.
    fn open(
        &mut self,
        endpoint: Endpoint,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Closes the socket with the given close code.
    fn close(&mut self, code: u16) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a text frame.
    fn send_text(
        &mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a binary frame.
    fn send_binary(
        &mut self,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Waits for the next inbound event.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportEvent> + Send + '_>>;

    fn is_open(&self) -> bool;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    /// The WebSocket connection, if open.
    ws: Option<WebSocketConnection>,
    /// Set after a successful open until `recv` reports it.
    opened_pending: bool,
}

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: SplitSink<Socket, Message>,
    stream: SplitStream<Socket>,
}

impl WebSocketTransport {
    /// Create a new, unopened WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport {
            ws: None,
            opened_pending: false,
        }
    }

    async fn send_message(&mut self, message: Message) -> TransportResult<()> {
        let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

        if let Err(e) = ws.sink.send(message).await {
            // Connection is broken, clear it
            self.ws = None;
            return Err(TransportError::SendFailed(e.to_string()));
        }
        Ok(())
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_request(
    endpoint: &Endpoint,
) -> TransportResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
    let mut request = endpoint
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

    for (name, value) in &endpoint.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert(name, value);
    }
    Ok(request)
}

impl Transport for WebSocketTransport {
    fn open(
        &mut self,
        endpoint: Endpoint,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.ws.is_some() {
                return Ok(());
            }

            let request = build_request(&endpoint)?;
            let (ws_stream, _) =
                tokio::time::timeout(endpoint.connect_timeout, tokio_tungstenite::connect_async(request))
                    .await
                    .map_err(|_| TransportError::Timeout)?
                    .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            self.ws = Some(WebSocketConnection { sink, stream });
            self.opened_pending = true;
            tracing::debug!(url = %endpoint.url, "websocket opened");
            Ok(())
        })
    }

    fn close(&mut self, code: u16) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.opened_pending = false;
            if let Some(mut ws) = self.ws.take() {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: "".into(),
                };
                // The peer may already be gone; closing is best effort.
                let _ = ws.sink.send(Message::Close(Some(frame))).await;
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send_text(
        &mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { self.send_message(Message::Text(text.into())).await })
    }

    fn send_binary(
        &mut self,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { self.send_message(Message::Binary(bytes.into())).await })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportEvent> + Send + '_>> {
        Box::pin(async move {
            if std::mem::take(&mut self.opened_pending) {
                return TransportEvent::Opened;
            }

            let Some(ws) = self.ws.as_mut() else {
                return TransportEvent::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: "not open".to_string(),
                };
            };

            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => return TransportEvent::Text(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(bytes))) => return TransportEvent::Binary(bytes.to_vec()),
                    Some(Ok(Message::Close(frame))) => {
                        self.ws = None;
                        return match frame {
                            Some(frame) => TransportEvent::Closed {
                                code: u16::from(frame.code),
                                reason: frame.reason.as_str().to_owned(),
                            },
                            None => TransportEvent::Closed {
                                code: CLOSE_ABNORMAL,
                                reason: String::new(),
                            },
                        };
                    }
                    // tungstenite answers pings itself
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.ws = None;
                        return TransportEvent::Error(e.to_string());
                    }
                    None => {
                        self.ws = None;
                        return TransportEvent::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: "stream ended".to_string(),
                        };
                    }
                }
            }
        })
    }

    fn is_open(&self) -> bool {
        self.ws.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
