// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: an in-memory transport and a scripted authorizer.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::auth::{AuthError, AuthFuture, Authorizer};
use crate::config::Endpoint;
use crate::transport::{Transport, TransportError, TransportEvent, TransportResult};

#[derive(Default)]
struct HubState {
    /// Text frames sent by any transport, in order.
    outgoing: Vec<String>,
    /// Inbound feed of the most recently opened transport.
    inbound: Option<mpsc::UnboundedSender<TransportEvent>>,
    /// Number of successful opens.
    opens: usize,
    /// Number of open calls that should fail before one succeeds.
    failing_opens: usize,
    /// Close codes passed to `close`.
    closes: Vec<u16>,
}

/// Shared control panel for every [`MockTransport`] built from it.
#[derive(Clone, Default)]
pub struct MockHub {
    state: Arc<Mutex<HubState>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory producing transports wired to this hub.
    pub fn factory(&self) -> impl Fn() -> MockTransport + Send + 'static {
        let hub = self.clone();
        move || MockTransport {
            hub: hub.clone(),
            inbound: None,
        }
    }

    /// Makes the next `n` open calls fail.
    pub fn fail_opens(&self, n: usize) {
        self.state.lock().unwrap().failing_opens = n;
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> Vec<u16> {
        self.state.lock().unwrap().closes.clone()
    }

    pub fn outgoing(&self) -> Vec<String> {
        self.state.lock().unwrap().outgoing.clone()
    }

    /// How many times `frame` was sent.
    pub fn sent_count(&self, frame: &str) -> usize {
        self.outgoing().iter().filter(|sent| *sent == frame).count()
    }

    /// Feeds an event to the current connection.
    pub fn push(&self, event: TransportEvent) {
        let state = self.state.lock().unwrap();
        let inbound = state.inbound.as_ref().unwrap();
        inbound.send(event).unwrap();
    }

    pub fn push_text(&self, raw: &str) {
        self.push(TransportEvent::Text(raw.to_string()));
    }

    /// Sends the `pusher:connection_established` handshake.
    pub fn handshake(&self, socket_id: &str) {
        let data = serde_json::json!({ "socket_id": socket_id, "activity_timeout": 120 });
        let frame = serde_json::json!({
            "event": "pusher:connection_established",
            "data": data.to_string(),
        });
        self.push_text(&frame.to_string());
    }

    /// Simulates the server closing the connection.
    pub fn drop_connection(&self, code: u16) {
        self.push(TransportEvent::Closed {
            code,
            reason: "test".to_string(),
        });
    }
}

/// In-memory transport. Inbound events come from the hub; outbound frames
/// are recorded on it.
pub struct MockTransport {
    hub: MockHub,
    inbound: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl Transport for MockTransport {
    fn open(
        &mut self,
        _endpoint: Endpoint,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.inbound.is_some() {
                return Ok(());
            }
            let mut state = self.hub.state.lock().unwrap();
            if state.failing_opens > 0 {
                state.failing_opens -= 1;
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(TransportEvent::Opened).unwrap();
            state.inbound = Some(tx);
            state.opens += 1;
            self.inbound = Some(rx);
            Ok(())
        })
    }

    fn close(&mut self, code: u16) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.inbound.take().is_some() {
                self.hub.state.lock().unwrap().closes.push(code);
            }
            Ok(())
        })
    }

    fn send_text(
        &mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.inbound.is_none() {
                return Err(TransportError::ConnectionClosed);
            }
            self.hub.state.lock().unwrap().outgoing.push(text);
            Ok(())
        })
    }

    fn send_binary(
        &mut self,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let text = String::from_utf8(bytes).map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.send_text(text).await
        })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportEvent> + Send + '_>> {
        Box::pin(async move {
            let Some(inbound) = self.inbound.as_mut() else {
                return std::future::pending().await;
            };
            match inbound.recv().await {
                Some(event) => {
                    if event.is_terminal() {
                        self.inbound = None;
                    }
                    event
                }
                None => std::future::pending().await,
            }
        })
    }

    fn is_open(&self) -> bool {
        self.inbound.is_some()
    }
}

/// Authorizer answering from a script. Each call pops the next response;
/// an empty script answers with a network error.
#[derive(Clone, Default)]
pub struct MockAuthorizer {
    responses: Arc<Mutex<VecDeque<Result<String, AuthError>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    delay: Option<Duration>,
}

impl MockAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, response: Result<String, AuthError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// `(socket_id, channel)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Authorizer for MockAuthorizer {
    fn authorize<'a>(&'a self, socket_id: &'a str, channel: &'a str) -> AuthFuture<'a> {
        Box::pin(async move {
            let response = {
                self.calls
                    .lock()
                    .unwrap()
                    .push((socket_id.to_string(), channel.to_string()));
                self.responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(AuthError::Request("no scripted response".into())))
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }
}

/// Polls `condition` until it holds, or fails the test after two seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
