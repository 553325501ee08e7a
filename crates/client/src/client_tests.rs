// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::credentials::StaticCredentials;
use crate::test_helpers::{wait_until, MockAuthorizer, MockHub};

const CHANNEL: &str = "queue-doctor.9";
const EVENT: &str = "queue.updated";
const SUBSCRIBE: &str = r#"{"event":"pusher:subscribe","data":{"channel":"queue-doctor.9"}}"#;
const UNSUBSCRIBE: &str = r#"{"event":"pusher:unsubscribe","data":{"channel":"queue-doctor.9"}}"#;
const HANDSHAKE: &str =
    r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"123.456\"}"}"#;
const PING: &str = r#"{"event":"pusher:ping"}"#;
const PONG: &str = r#"{"event":"pusher:pong"}"#;
const KEEPALIVE_PING: &str = r#"{"event":"pusher:ping","data":{}}"#;

struct Harness {
    client: QueueClient,
    hub: MockHub,
    auth: MockAuthorizer,
    reachability: Reachability,
}

fn config() -> ClientConfig {
    let mut config = ClientConfig::new("127.0.0.1", "app-key");
    config.tls = false;
    config.keepalive_interval_ms = 0;
    config.reconnect_initial_delay_ms = 10;
    config.reconnect_max_delay_secs = 1;
    config
}

fn start(config: ClientConfig) -> Harness {
    start_with(config, MockAuthorizer::new())
}

fn start_with(config: ClientConfig, auth: MockAuthorizer) -> Harness {
    let hub = MockHub::new();
    let reachability = Reachability::new(true);
    let client = QueueClient::spawn(
        config,
        Arc::new(StaticCredentials::new(Some(9), Some("token".into()))),
        Arc::new(auth.clone()),
        reachability.clone(),
        hub.factory(),
    )
    .unwrap();
    Harness {
        client,
        hub,
        auth,
        reachability,
    }
}

async fn wait_state(client: &QueueClient, expected: ConnectionState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|state| *state == expected))
        .await
        .unwrap()
        .unwrap();
}

/// Connects, completes the handshake and confirms the public subscription.
async fn subscribed(h: &Harness) {
    h.client.subscribe(CHANNEL, EVENT).unwrap();
    h.client.connect().unwrap();
    wait_until("first open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);
    wait_until("subscribe frame", || h.hub.sent_count(SUBSCRIBE) == 1).await;
    h.hub.push_text(
        r#"{"event":"pusher_internal:subscription_succeeded","channel":"queue-doctor.9","data":"{}"}"#,
    );
    wait_state(&h.client, ConnectionState::Subscribed).await;
}

fn broadcast(data: serde_json::Value) -> String {
    serde_json::json!({ "event": EVENT, "channel": CHANNEL, "data": data.to_string() }).to_string()
}

/// Drains state changes currently buffered in an event stream.
async fn drain_states(events: &mut Pin<Box<impl Stream<Item = ClientEvent>>>) -> Vec<ConnectionState> {
    let mut states = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), events.next()).await {
        if let ClientEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    states
}

#[tokio::test]
async fn handshake_then_subscribe_sends_subscribe_frame() {
    let h = start(config());
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    assert_eq!(h.client.state(), ConnectionState::Connecting);

    h.hub.push_text(HANDSHAKE);
    wait_state(&h.client, ConnectionState::Connected).await;

    h.client.subscribe(CHANNEL, EVENT).unwrap();
    wait_until("subscribe frame", || h.hub.sent_count(SUBSCRIBE) == 1).await;

    assert_eq!(h.hub.outgoing(), vec![SUBSCRIBE.to_string()]);
    assert_eq!(h.client.state(), ConnectionState::Subscribing);
}

#[tokio::test]
async fn subscribe_before_connect_is_buffered() {
    let h = start(config());
    h.client.subscribe(CHANNEL, EVENT).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.hub.outgoing().is_empty());

    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);

    wait_until("subscribe frame", || h.hub.sent_count(SUBSCRIBE) == 1).await;
}

#[tokio::test]
async fn ping_gets_exactly_one_pong_and_no_transition() {
    let h = start(config());
    subscribed(&h).await;
    let mut events = Box::pin(h.client.events());

    h.hub.push_text(PING);
    wait_until("pong", || h.hub.sent_count(PONG) == 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(h.hub.sent_count(PONG), 1);
    assert_eq!(h.client.state(), ConnectionState::Subscribed);
    assert!(drain_states(&mut events).await.is_empty());
}

#[tokio::test]
async fn close_while_subscribed_reconnects_when_network_returns() {
    let h = start(config());
    subscribed(&h).await;
    let mut events = Box::pin(h.client.events());

    h.reachability.set_available(false);
    h.hub.drop_connection(1006);
    wait_state(&h.client, ConnectionState::Reconnecting).await;

    // No busy retrying while offline.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.hub.opens(), 1);
    assert_eq!(h.client.state(), ConnectionState::Reconnecting);

    h.reachability.set_available(true);
    wait_until("second open", || h.hub.opens() == 2).await;
    h.hub.handshake("2.2");
    wait_until("subscribe replay", || h.hub.sent_count(SUBSCRIBE) == 2).await;

    assert_eq!(
        drain_states(&mut events).await,
        vec![
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Subscribing,
        ]
    );
}

#[tokio::test]
async fn reconnects_after_backoff_while_reachable() {
    let h = start(config());
    subscribed(&h).await;

    h.hub.drop_connection(1006);

    wait_until("reconnect", || h.hub.opens() == 2).await;
    h.hub.handshake("2.2");
    wait_until("subscribe replay", || h.hub.sent_count(SUBSCRIBE) == 2).await;
}

#[tokio::test]
async fn failed_open_is_retried() {
    let h = start(config());
    h.hub.fail_opens(2);
    h.client.connect().unwrap();

    wait_until("open after failures", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);
    wait_state(&h.client, ConnectionState::Connected).await;
}

#[tokio::test]
async fn retry_limit_moves_to_failed() {
    let mut config = config();
    config.reconnect_max_retries = 2;
    let h = start(config);
    h.hub.fail_opens(10);

    h.client.connect().unwrap();

    wait_state(&h.client, ConnectionState::Failed).await;
    assert_eq!(h.hub.opens(), 0);
}

#[tokio::test]
async fn do_not_reconnect_close_code_fails() {
    let h = start(config());
    subscribed(&h).await;

    h.hub.drop_connection(4001);

    wait_state(&h.client, ConnectionState::Failed).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.hub.opens(), 1);
}

#[tokio::test]
async fn reconnect_disabled_fails_on_close() {
    let mut config = config();
    config.reconnect = false;
    let h = start(config);
    subscribed(&h).await;

    h.hub.drop_connection(1006);

    wait_state(&h.client, ConnectionState::Failed).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.hub.opens(), 1);
}

#[tokio::test]
async fn restricted_channel_is_authorized_with_socket_id() {
    let auth = MockAuthorizer::new();
    auth.respond(Ok("key:sig".into()));
    let h = start_with(config(), auth);

    h.client.subscribe("private-queue-doctor.9", EVENT).unwrap();
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);

    let expected =
        r#"{"event":"pusher:subscribe","data":{"auth":"key:sig","channel":"private-queue-doctor.9"}}"#;
    wait_until("authorized subscribe", || h.hub.sent_count(expected) == 1).await;
    assert_eq!(
        h.auth.calls(),
        vec![("123.456".to_string(), "private-queue-doctor.9".to_string())]
    );
}

#[tokio::test]
async fn auth_failure_waits_for_next_connection() {
    let auth = MockAuthorizer::new();
    auth.respond(Err(AuthError::Status(500)));
    auth.respond(Ok("key:sig".into()));
    let h = start_with(config(), auth);
    let mut events = Box::pin(h.client.events());

    h.client.subscribe("private-queue-doctor.9", EVENT).unwrap();
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);

    let error = loop {
        match events.next().await.unwrap() {
            ClientEvent::SubscriptionError { channel, message } => break (channel, message),
            _ => continue,
        }
    };
    assert_eq!(error.0, "private-queue-doctor.9");
    assert!(error.1.contains("500"));
    assert_eq!(h.client.state(), ConnectionState::Connected);

    // Not retried on a timer, and the connection stays up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.auth.calls().len(), 1);
    assert!(h.hub.closes().is_empty());

    h.hub.drop_connection(1006);
    wait_until("reconnect", || h.hub.opens() == 2).await;
    h.hub.handshake("2.2");

    wait_until("second auth", || h.auth.calls().len() == 2).await;
    assert_eq!(h.auth.calls()[1].0, "2.2");
    wait_until("authorized subscribe", || {
        h.hub.outgoing().iter().any(|frame| frame.contains("key:sig"))
    })
    .await;
}

#[tokio::test]
async fn auth_result_from_previous_connection_is_discarded() {
    let auth = MockAuthorizer::new().with_delay(Duration::from_millis(100));
    auth.respond(Ok("old".into()));
    auth.respond(Ok("new".into()));
    let h = start_with(config(), auth);

    h.client.subscribe("private-queue-doctor.9", EVENT).unwrap();
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.handshake("1.1");
    wait_until("first auth", || h.auth.calls().len() == 1).await;

    h.hub.drop_connection(1006);
    wait_until("reconnect", || h.hub.opens() == 2).await;
    h.hub.handshake("2.2");

    wait_until("new subscribe", || {
        h.hub.outgoing().iter().any(|frame| frame.contains("\"new\""))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!h.hub.outgoing().iter().any(|frame| frame.contains("\"old\"")));
}

#[tokio::test]
async fn subscription_error_is_reported() {
    let h = start(config());
    let mut events = Box::pin(h.client.events());
    h.client.subscribe(CHANNEL, EVENT).unwrap();
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);
    wait_until("subscribe", || h.hub.sent_count(SUBSCRIBE) == 1).await;

    h.hub.push_text(
        r#"{"event":"pusher:subscription_error","channel":"queue-doctor.9","data":{"type":"AuthError","error":"denied","status":401}}"#,
    );

    let message = loop {
        if let ClientEvent::SubscriptionError { message, .. } = events.next().await.unwrap() {
            break message;
        }
    };
    assert_eq!(message, "denied");
    wait_state(&h.client, ConnectionState::Connected).await;
}

#[tokio::test]
async fn application_events_update_snapshot() {
    let h = start(config());
    subscribed(&h).await;

    h.hub.push_text(&broadcast(serde_json::json!({"script_uuid": "abc", "doctor_id": 9})));
    wait_until("insert", || h.client.snapshot().len() == 1).await;
    assert_eq!(h.client.snapshot()[0].id, "abc");

    h.hub.push_text(&broadcast(
        serde_json::json!({"action": "remove", "script_uuid": "abc", "doctor_id": 9}),
    ));
    wait_until("remove", || h.client.snapshot().is_empty()).await;
}

#[tokio::test]
async fn frames_outside_subscription_are_ignored() {
    let h = start(config());
    subscribed(&h).await;

    let other_channel = serde_json::json!({
        "event": EVENT, "channel": "queue-doctor.10", "data": {"script_uuid": "x"}
    });
    let other_event = serde_json::json!({
        "event": "other.event", "channel": CHANNEL, "data": {"script_uuid": "y"}
    });
    h.hub.push_text(&other_channel.to_string());
    h.hub.push_text(&other_event.to_string());
    h.hub.push_text("not json");
    h.hub.push_text(&broadcast(serde_json::json!({"script_uuid": "z"})));

    wait_until("accepted frame", || h.client.snapshot().len() == 1).await;
    assert_eq!(h.client.snapshot()[0].id, "z");
    assert_eq!(h.client.state(), ConnectionState::Subscribed);
}

#[tokio::test]
async fn snapshot_stream_starts_with_current_view() {
    let h = start(config());
    subscribed(&h).await;
    h.hub.push_text(&broadcast(serde_json::json!({"queue": [{"script_uuid": "a"}, {"script_uuid": "b"}]})));
    wait_until("list", || h.client.snapshot().len() == 2).await;

    let mut snapshots = Box::pin(h.client.snapshots());
    let first = snapshots.next().await.unwrap();
    let ids: Vec<_> = first.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn snapshot_survives_reconnect() {
    let h = start(config());
    subscribed(&h).await;
    h.hub.push_text(&broadcast(serde_json::json!({"script_uuid": "keep"})));
    wait_until("insert", || h.client.snapshot().len() == 1).await;

    h.hub.drop_connection(1006);
    wait_until("reconnect", || h.hub.opens() == 2).await;

    assert_eq!(h.client.snapshot()[0].id, "keep");
}

#[tokio::test]
async fn unsubscribe_sends_frame_and_returns_to_connected() {
    let h = start(config());
    subscribed(&h).await;

    h.client.unsubscribe().unwrap();

    wait_until("unsubscribe", || h.hub.sent_count(UNSUBSCRIBE) == 1).await;
    wait_state(&h.client, ConnectionState::Connected).await;
}

#[tokio::test]
async fn disconnect_tears_everything_down() {
    let h = start(config());
    subscribed(&h).await;
    assert_eq!(h.reachability.subscriber_count(), 1);

    h.client.disconnect().await.unwrap();

    assert_eq!(h.client.state(), ConnectionState::Failed);
    assert_eq!(h.hub.sent_count(UNSUBSCRIBE), 1);
    assert_eq!(h.hub.closes(), vec![CLOSE_NORMAL]);
    assert_eq!(h.reachability.subscriber_count(), 0);

    let err = h.client.subscribe(CHANNEL, EVENT).unwrap_err();
    assert!(matches!(err, ClientError::StateViolation(_)));
}

#[tokio::test]
async fn dropping_the_handle_shuts_down() {
    let h = start(config());
    subscribed(&h).await;
    let Harness {
        client,
        hub,
        reachability,
        ..
    } = h;

    drop(client);

    wait_until("teardown", || reachability.subscriber_count() == 0).await;
    assert_eq!(hub.closes(), vec![CLOSE_NORMAL]);
}

#[tokio::test]
async fn keepalive_pings_are_advisory_by_default() {
    let mut config = config();
    config.keepalive_interval_ms = 20;
    let h = start(config);
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);

    wait_until("pings", || h.hub.sent_count(KEEPALIVE_PING) >= 3).await;
    assert_eq!(h.hub.opens(), 1);
    assert_eq!(h.client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn unanswered_ping_drops_connection_with_pong_timeout() {
    let mut config = config();
    config.keepalive_interval_ms = 20;
    config.pong_timeout_ms = 30;
    let h = start(config);
    h.client.connect().unwrap();
    wait_until("open", || h.hub.opens() == 1).await;
    h.hub.push_text(HANDSHAKE);

    wait_until("ping", || h.hub.sent_count(KEEPALIVE_PING) >= 1).await;
    wait_until("reconnect", || h.hub.opens() == 2).await;
    assert_eq!(h.hub.closes(), vec![CLOSE_NORMAL]);
}

#[tokio::test]
async fn empty_names_are_rejected() {
    let h = start(config());
    assert!(matches!(
        h.client.subscribe("  ", EVENT),
        Err(ClientError::StateViolation(_))
    ));
    assert!(matches!(
        h.client.subscribe(CHANNEL, ""),
        Err(ClientError::StateViolation(_))
    ));
}

#[tokio::test]
async fn invalid_config_is_reported_synchronously() {
    let hub = MockHub::new();
    let result = QueueClient::spawn(
        ClientConfig::new("", "key"),
        Arc::new(StaticCredentials::default()),
        Arc::new(MockAuthorizer::new()),
        Reachability::new(true),
        hub.factory(),
    );
    assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
}

#[tokio::test]
async fn malformed_frame_is_reported_and_dropped() {
    let h = start(config());
    subscribed(&h).await;
    let mut events = Box::pin(h.client.events());

    h.hub.push_text("not json");
    h.hub.push(TransportEvent::Binary(vec![0xff, 0xfe]));

    let mut errors = Vec::new();
    while errors.len() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .unwrap()
            .unwrap();
        if let ClientEvent::Error(message) = event {
            errors.push(message);
        }
    }

    assert!(errors.iter().all(|message| message.starts_with("dropped frame")));
    assert_eq!(h.client.state(), ConnectionState::Subscribed);
    assert!(h.client.snapshot().is_empty());
}
