// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The queue client: a handle plus a background task that owns the
//! connection.
//!
//! The task is the only owner of the transport, the connection state, the
//! subscription slot and the queue store. The handle talks to it through a
//! command channel; auth requests run in their own tasks and post results
//! back; reachability arrives on a watch channel. All of it is multiplexed
//! with `tokio::select!` so no suspension point blocks another.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use qs_core::protocol::{ConnectionEstablished, Frame, FrameKind, ProtocolError};
use qs_core::{QueueItem, QueueStore};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthError, Authorizer, HttpAuthorizer, NoAuthorizer};
use crate::config::{ClientConfig, Endpoint};
use crate::credentials::Credentials;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::keepalive::Keepalive;
use crate::reachability::Reachability;
use crate::reconnect::Backoff;
use crate::state::ConnectionState;
use crate::subscription::{AuthOutcome, SubscribeStep, Subscription, SubscriptionManager};
use crate::transport::{
    Transport, TransportEvent, TransportResult, WebSocketTransport, CLOSE_NORMAL,
};

/// Capacity of the lifecycle event channel. Slow consumers skip ahead.
const EVENT_CAPACITY: usize = 64;

/// Close codes in this range tell the client not to reconnect.
const DO_NOT_RECONNECT: std::ops::Range<u16> = 4000..4100;

/// Requests from the handle to the client task.
#[derive(Debug)]
enum Command {
    Connect,
    Subscribe(Subscription),
    Unsubscribe,
    Disconnect { done: oneshot::Sender<()> },
}

/// Auth result posted back by an auth task.
#[derive(Debug)]
struct AuthReply {
    generation: u64,
    result: std::result::Result<String, AuthError>,
}

type OpenFuture<T> = Pin<Box<dyn Future<Output = (T, TransportResult<()>)> + Send>>;

/// Handle to a running queue client.
///
/// Dropping the handle shuts the client down.
pub struct QueueClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    events_tx: broadcast::Sender<ClientEvent>,
    state_rx: watch::Receiver<ConnectionState>,
    snapshot_rx: watch::Receiver<Arc<[QueueItem]>>,
    cancel: CancellationToken,
}

impl QueueClient {
    /// Starts a client over real WebSockets, using the process-wide
    /// reachability monitor. Must be called from within a tokio runtime.
    pub fn new(config: ClientConfig, credentials: Arc<dyn Credentials>) -> Result<Self> {
        let authorizer: Arc<dyn Authorizer> = match config.auth_url()? {
            Some(url) => Arc::new(HttpAuthorizer::new(url, Arc::clone(&credentials))),
            None => Arc::new(NoAuthorizer),
        };
        Self::spawn(
            config,
            credentials,
            authorizer,
            Reachability::shared(),
            WebSocketTransport::new,
        )
    }

    /// Starts a client with injected collaborators. `transport_factory` is
    /// called once per connection attempt.
    ///
    /// Fails synchronously only on configuration errors.
    pub fn spawn<T, F>(
        config: ClientConfig,
        credentials: Arc<dyn Credentials>,
        authorizer: Arc<dyn Authorizer>,
        reachability: Reachability,
        transport_factory: F,
    ) -> Result<Self>
    where
        T: Transport,
        F: Fn() -> T + Send + 'static,
    {
        let endpoint = config.endpoint()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (auth_tx, auth_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::<[QueueItem]>::from(Vec::new()));
        let cancel = CancellationToken::new();

        let actor = Actor {
            reconnect_enabled: config.reconnect,
            backoff: config.backoff(),
            pong_timeout: config.pong_timeout(),
            endpoint,
            factory: transport_factory,
            authorizer,
            transport: None,
            opening: None,
            state: ConnectionState::Disconnected,
            socket_id: None,
            subscriptions: SubscriptionManager::new(),
            store: QueueStore::new(credentials.owner_id()),
            keepalive: Keepalive::new(),
            keepalive_timer: None,
            retry_at: None,
            reachability: reachability.subscribe(),
            reachability_closed: false,
            cmd_rx,
            auth_tx,
            auth_rx,
            events_tx: events_tx.clone(),
            state_tx,
            snapshot_tx,
            cancel: cancel.clone(),
        };

        tokio::spawn(async move {
            if let Some(done) = actor.run().await {
                let _ = done.send(());
            }
        });

        Ok(QueueClient {
            cmd_tx,
            events_tx,
            state_rx,
            snapshot_rx,
            cancel,
        })
    }

    fn command(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ClientError::StateViolation("client has shut down".to_string()))
    }

    /// Starts connecting. A no-op while already connecting or connected;
    /// from `reconnecting` it skips the remaining backoff.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Subscribes to `event` on `channel`. Replaces any previous subscription.
    ///
    /// Buffered until the connection is up, and replayed after every
    /// reconnect.
    pub fn subscribe(&self, channel: &str, event: &str) -> Result<()> {
        let channel = channel.trim();
        let event = event.trim();
        if channel.is_empty() {
            return Err(ClientError::StateViolation(
                "channel name must not be empty".to_string(),
            ));
        }
        if event.is_empty() {
            return Err(ClientError::StateViolation(
                "event name must not be empty".to_string(),
            ));
        }
        self.command(Command::Subscribe(Subscription::new(channel, event)))
    }

    /// Drops the subscription.
    pub fn unsubscribe(&self) -> Result<()> {
        self.command(Command::Unsubscribe)
    }

    /// Closes the connection for good and waits until the client task has
    /// released the transport and its reachability subscription.
    pub async fn disconnect(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.command(Command::Disconnect { done })?;
        // The task is gone either way once this resolves.
        let _ = wait.await;
        Ok(())
    }

    /// Lifecycle events from now on. Each call starts an independent stream.
    pub fn events(&self) -> impl Stream<Item = ClientEvent> + Send + 'static {
        BroadcastStream::new(self.events_tx.subscribe()).filter_map(|event| event.ok())
    }

    /// Queue snapshots, starting with the current one.
    pub fn snapshots(&self) -> impl Stream<Item = Arc<[QueueItem]>> + Send + 'static {
        WatchStream::new(self.snapshot_rx.clone())
    }

    /// The latest queue snapshot.
    pub fn snapshot(&self) -> Arc<[QueueItem]> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watches the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

impl Drop for QueueClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the client task.
struct Actor<T: Transport, F> {
    endpoint: Endpoint,
    factory: F,
    authorizer: Arc<dyn Authorizer>,

    /// Open transport, after the open future resolved.
    transport: Option<T>,
    /// In-flight connection attempt.
    opening: Option<OpenFuture<T>>,

    state: ConnectionState,
    /// Session id of the current connection; never reused.
    socket_id: Option<String>,
    subscriptions: SubscriptionManager,
    store: QueueStore,

    keepalive: Keepalive,
    keepalive_timer: Option<Interval>,
    pong_timeout: Option<Duration>,

    reconnect_enabled: bool,
    backoff: Backoff,
    retry_at: Option<Instant>,
    reachability: watch::Receiver<bool>,
    reachability_closed: bool,

    cmd_rx: mpsc::UnboundedReceiver<Command>,
    auth_tx: mpsc::UnboundedSender<AuthReply>,
    auth_rx: mpsc::UnboundedReceiver<AuthReply>,
    events_tx: broadcast::Sender<ClientEvent>,
    state_tx: watch::Sender<ConnectionState>,
    snapshot_tx: watch::Sender<Arc<[QueueItem]>>,
    cancel: CancellationToken,
}

impl<T, F> Actor<T, F>
where
    T: Transport,
    F: Fn() -> T + Send + 'static,
{
    /// Runs until shutdown. Returns the disconnect acknowledgement, which the
    /// caller fires after the actor (and its reachability receiver) is gone.
    async fn run(mut self) -> Option<oneshot::Sender<()>> {
        self.keepalive_timer = self.endpoint.keepalive_interval.map(|period| {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            let live = self.state.is_live();
            let reconnecting = self.state == ConnectionState::Reconnecting;
            let watch_reachability = reconnecting && !self.reachability_closed;
            let pong_deadline = self.keepalive.deadline(self.pong_timeout);

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.shutdown().await;
                    return None;
                }

                command = self.cmd_rx.recv() => match command {
                    Some(Command::Disconnect { done }) => {
                        self.shutdown().await;
                        return Some(done);
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.shutdown().await;
                        return None;
                    }
                },

                (transport, result) = poll_opening(&mut self.opening) => {
                    self.opening = None;
                    self.on_opened(transport, result);
                }

                event = recv_from(&mut self.transport) => self.on_transport_event(event).await,

                Some(reply) = self.auth_rx.recv() => self.on_auth_reply(reply).await,

                changed = self.reachability.changed(), if watch_reachability => match changed {
                    Ok(()) => self.on_reachability_changed(),
                    Err(_) => {
                        tracing::debug!("reachability monitor gone, relying on backoff");
                        self.reachability_closed = true;
                        if self.retry_at.is_none() {
                            self.schedule_retry();
                        }
                    }
                },

                _ = sleep_until(self.retry_at), if reconnecting => self.start_attempt(),

                _ = tick(&mut self.keepalive_timer), if live => self.on_keepalive_tick().await,

                _ = sleep_until(pong_deadline), if live => self.on_pong_timeout().await,
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => match self.state {
                ConnectionState::Disconnected | ConnectionState::Failed => {
                    self.backoff.reset();
                    self.start_attempt();
                }
                ConnectionState::Reconnecting => {
                    self.backoff.record_immediate();
                    self.start_attempt();
                }
                _ => tracing::debug!(state = %self.state, "connect ignored"),
            },
            Command::Subscribe(subscription) => {
                tracing::info!(
                    channel = %subscription.channel_name,
                    event = %subscription.event_name,
                    "subscribe requested"
                );
                match self.subscriptions.request(subscription) {
                    Ok(Some(unsubscribe)) => self.send(unsubscribe).await,
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "could not encode unsubscribe"),
                }
                if self.state == ConnectionState::Subscribed && !self.subscriptions.is_active() {
                    self.set_state(ConnectionState::Connected);
                }
                self.begin_subscription().await;
            }
            Command::Unsubscribe => {
                match self.subscriptions.clear() {
                    Ok(Some(unsubscribe)) => self.send(unsubscribe).await,
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "could not encode unsubscribe"),
                }
                if matches!(
                    self.state,
                    ConnectionState::Subscribing | ConnectionState::Subscribed
                ) {
                    self.set_state(ConnectionState::Connected);
                }
            }
            // Handled by the run loop.
            Command::Disconnect { .. } => {}
        }
    }

    /// Starts a fresh connection attempt with a new transport.
    fn start_attempt(&mut self) {
        self.retry_at = None;
        self.transport = None;
        let mut transport = (self.factory)();
        let endpoint = self.endpoint.clone();
        tracing::info!(url = %endpoint.url, attempt = self.backoff.attempt(), "connecting");
        self.opening = Some(Box::pin(async move {
            let result = transport.open(endpoint).await;
            (transport, result)
        }));
        self.set_state(ConnectionState::Connecting);
    }

    fn on_opened(&mut self, transport: T, result: TransportResult<()>) {
        match result {
            Ok(()) => {
                tracing::debug!("transport open, awaiting handshake");
                self.keepalive.reset();
                self.transport = Some(transport);
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection attempt failed");
                self.emit(ClientEvent::Error(e.to_string()));
                self.on_connection_lost(None);
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => tracing::debug!("socket opened"),
            TransportEvent::Text(raw) => {
                self.keepalive.frame_received();
                self.on_text(&raw).await;
            }
            TransportEvent::Binary(bytes) => {
                self.keepalive.frame_received();
                match String::from_utf8(bytes) {
                    Ok(raw) => self.on_text(&raw).await,
                    Err(_) => {
                        tracing::warn!("dropping non-UTF-8 binary frame");
                        self.emit(ClientEvent::Error("dropped frame: binary payload is not UTF-8".into()));
                    }
                }
            }
            TransportEvent::Closed { code, reason } => {
                tracing::info!(code, reason = %reason, "connection closed");
                self.transport = None;
                self.on_connection_lost(Some(code));
            }
            TransportEvent::Error(message) => {
                tracing::error!(error = %message, "transport error");
                self.emit(ClientEvent::Error(message));
                self.transport = None;
                self.on_connection_lost(None);
            }
        }
    }

    async fn on_text(&mut self, raw: &str) {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                self.emit(ClientEvent::Error(format!("dropped frame: {}", e)));
                return;
            }
        };
        tracing::debug!(event = %frame.event, channel = ?frame.channel, "frame received");

        match frame.kind() {
            FrameKind::ConnectionEstablished => self.on_handshake(&frame).await,
            FrameKind::Ping => match Frame::pong().to_json() {
                Ok(pong) => self.send(pong).await,
                Err(e) => tracing::warn!(error = %e, "could not encode pong"),
            },
            FrameKind::Pong => {}
            FrameKind::SubscriptionSucceeded => {
                if self.subscriptions.on_succeeded(frame.channel.as_deref()) {
                    let channel = frame.channel.unwrap_or_default();
                    tracing::info!(channel = %channel, "subscribed");
                    self.set_state(ConnectionState::Subscribed);
                    self.emit(ClientEvent::Subscribed { channel });
                }
            }
            FrameKind::SubscriptionError => {
                let error = ProtocolError::from_frame(&frame);
                if self.subscriptions.on_error(frame.channel.as_deref()) {
                    let channel = self.subscribed_channel();
                    tracing::warn!(channel = %channel, error = %error.message, "subscription rejected");
                    self.set_state(ConnectionState::Connected);
                    self.emit(ClientEvent::SubscriptionError {
                        channel,
                        message: error.message,
                    });
                }
            }
            FrameKind::Error => {
                let error = ProtocolError::from_frame(&frame);
                tracing::warn!(code = ?error.code, error = %error.message, "server error");
                self.emit(ClientEvent::Error(error.message));
            }
            FrameKind::Application => {
                if !self.subscriptions.accepts(&frame) {
                    tracing::debug!(event = %frame.event, "ignoring frame outside subscription");
                    return;
                }
                let applied = self.store.apply_event(&frame.data);
                tracing::debug!(?applied, "queue event applied");
                if applied.is_change() {
                    self.snapshot_tx.send_replace(Arc::from(self.store.items()));
                }
            }
        }
    }

    async fn on_handshake(&mut self, frame: &Frame) {
        let established = match ConnectionEstablished::from_frame(frame) {
            Ok(established) => established,
            Err(e) => {
                tracing::warn!(error = %e, "dropping bad handshake");
                return;
            }
        };

        tracing::info!(
            socket_id = %established.socket_id,
            activity_timeout = ?established.activity_timeout,
            "connected"
        );
        self.socket_id = Some(established.socket_id.clone());
        self.backoff.reset();
        self.keepalive.reset();
        if let Some(timer) = self.keepalive_timer.as_mut() {
            timer.reset();
        }
        self.set_state(ConnectionState::Connected);
        self.emit(ClientEvent::Connected {
            socket_id: established.socket_id,
        });
        self.begin_subscription().await;
    }

    /// Sends the subscribe frame or starts auth, if the slot is pending and
    /// the connection is up.
    async fn begin_subscription(&mut self) {
        let Some(socket_id) = self.socket_id.clone() else {
            return;
        };
        match self.subscriptions.begin(&socket_id) {
            Ok(Some(SubscribeStep::Send(frame))) => {
                self.send(frame).await;
                self.set_state(ConnectionState::Subscribing);
            }
            Ok(Some(SubscribeStep::Authorize {
                generation,
                channel,
                socket_id,
            })) => {
                self.spawn_auth(generation, channel, socket_id);
                self.set_state(ConnectionState::Subscribing);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "could not encode subscribe"),
        }
    }

    fn spawn_auth(&self, generation: u64, channel: String, socket_id: String) {
        let authorizer = Arc::clone(&self.authorizer);
        let reply_tx = self.auth_tx.clone();
        tokio::spawn(async move {
            let result = authorizer.authorize(&socket_id, &channel).await;
            let _ = reply_tx.send(AuthReply { generation, result });
        });
    }

    async fn on_auth_reply(&mut self, reply: AuthReply) {
        match self.subscriptions.on_auth_result(reply.generation, reply.result) {
            Ok(AuthOutcome::Send(frame)) => self.send(frame).await,
            Ok(AuthOutcome::Deferred(err)) => {
                let channel = self.subscribed_channel();
                tracing::warn!(channel = %channel, error = %err, "channel auth failed");
                if self.state == ConnectionState::Subscribing {
                    self.set_state(ConnectionState::Connected);
                }
                self.emit(ClientEvent::SubscriptionError {
                    channel,
                    message: err.to_string(),
                });
            }
            Ok(AuthOutcome::Stale) => tracing::debug!("discarding stale auth result"),
            Err(e) => tracing::warn!(error = %e, "could not encode subscribe"),
        }
    }

    fn on_reachability_changed(&mut self) {
        let available = *self.reachability.borrow_and_update();
        if available {
            tracing::info!("network available, reconnecting now");
            self.backoff.record_immediate();
            self.start_attempt();
        } else {
            tracing::info!("network unavailable, pausing reconnect");
            self.retry_at = None;
        }
    }

    async fn on_keepalive_tick(&mut self) {
        if self.keepalive.is_awaiting_pong() {
            tracing::debug!("previous ping still unanswered");
        }
        self.keepalive.ping_sent(Instant::now());
        match Frame::ping().to_json() {
            Ok(ping) => self.send(ping).await,
            Err(e) => tracing::warn!(error = %e, "could not encode ping"),
        }
    }

    async fn on_pong_timeout(&mut self) {
        if !self.keepalive.is_expired(Instant::now(), self.pong_timeout) {
            return;
        }
        tracing::warn!("keepalive unanswered, dropping connection");
        self.emit(ClientEvent::Error("keepalive timeout".to_string()));
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close(CLOSE_NORMAL).await;
        }
        self.on_connection_lost(None);
    }

    /// The transport is gone. Decides between reconnecting and failing.
    fn on_connection_lost(&mut self, code: Option<u16>) {
        self.transport = None;
        self.opening = None;
        self.socket_id = None;
        self.keepalive.reset();
        self.subscriptions.on_connection_lost();

        if !self.reconnect_enabled {
            tracing::info!("reconnect disabled");
            self.set_state(ConnectionState::Failed);
            return;
        }
        if let Some(code) = code.filter(|code| DO_NOT_RECONNECT.contains(code)) {
            tracing::warn!(code, "server asked not to reconnect");
            self.set_state(ConnectionState::Failed);
            return;
        }
        if self.backoff.is_exhausted() {
            tracing::warn!(attempts = self.backoff.attempt(), "reconnect attempts exhausted");
            self.set_state(ConnectionState::Failed);
            return;
        }

        self.set_state(ConnectionState::Reconnecting);
        let available = *self.reachability.borrow_and_update();
        if available || self.reachability_closed {
            self.schedule_retry();
        } else {
            tracing::info!("network unavailable, waiting before reconnecting");
            self.retry_at = None;
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.next_delay();
        tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting after backoff");
        self.retry_at = Some(Instant::now() + delay);
    }

    /// Deliberate teardown: no more reconnects, subscription dropped,
    /// transport closed.
    async fn shutdown(&mut self) {
        self.reconnect_enabled = false;
        self.retry_at = None;
        self.opening = None;
        self.keepalive_timer = None;
        match self.subscriptions.clear() {
            Ok(Some(unsubscribe)) => self.send(unsubscribe).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "could not encode unsubscribe"),
        }
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close(CLOSE_NORMAL).await {
                tracing::debug!(error = %e, "close failed");
            }
        }
        self.socket_id = None;
        self.keepalive.reset();
        tracing::info!("disconnected");
        self.set_state(ConnectionState::Failed);
    }

    async fn send(&mut self, text: String) {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!("no transport, dropping outbound frame");
            return;
        };
        tracing::debug!(frame = %text, "sending");
        if let Err(e) = transport.send_text(text).await {
            tracing::warn!(error = %e, "send failed");
        }
    }

    fn subscribed_channel(&self) -> String {
        self.subscriptions
            .subscription()
            .map(|sub| sub.channel_name.clone())
            .unwrap_or_default()
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = %self.state, to = %state, "state changed");
        self.state = state;
        self.state_tx.send_replace(state);
        self.emit(ClientEvent::StateChanged(state));
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}

async fn poll_opening<T>(opening: &mut Option<OpenFuture<T>>) -> (T, TransportResult<()>) {
    match opening.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn recv_from<T: Transport>(transport: &mut Option<T>) -> TransportEvent {
    match transport.as_mut() {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer.as_mut() {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
