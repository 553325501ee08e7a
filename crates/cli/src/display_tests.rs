// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{TimeZone, Utc};
use qs_client::ConnectionState;
use yare::parameterized;

fn item(id: &str, name: &str) -> QueueItem {
    QueueItem {
        id: id.to_string(),
        display_name: name.to_string(),
        clinic_label: "North".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
        owner_id: Some(7),
        script_id: None,
        script_uuid: Some(id.to_string()),
        script_number: None,
        room_name: None,
    }
}

#[test]
fn empty_table() {
    assert_eq!(format_snapshot_table(&[]), "(queue empty)\n");
}

#[test]
fn table_rows_in_snapshot_order() {
    let items = vec![item("b-2", "Second"), item("a-1", "First")];
    let table = format_snapshot_table(&items);
    let lines: Vec<&str> = table.lines().collect();

    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("ID "));
    assert!(lines[1].starts_with("b-2 "));
    assert!(lines[1].contains("Second"));
    assert!(lines[1].contains("2024-01-10 12:00:00"));
    assert!(lines[1].ends_with("  -"));
    assert!(lines[2].starts_with("a-1 "));
    assert_eq!(lines[3], "2 item(s)");
}

#[test]
fn table_shows_room() {
    let mut entry = item("a-1", "First");
    entry.room_name = Some("Room 3".into());
    assert!(format_snapshot_table(&[entry]).contains("Room 3"));
}

#[test]
fn long_names_are_truncated() {
    let entry = item("a-1", &"x".repeat(40));
    let table = format_snapshot_table(&[entry]);
    assert!(table.contains(&format!("{}…", "x".repeat(NAME_WIDTH - 1))));
    assert!(!table.contains(&"x".repeat(NAME_WIDTH)));
}

#[test]
fn json_line() {
    let line = format_snapshot_json(&[item("a-1", "First")]).unwrap();
    assert!(!line.contains('\n'));

    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["count"], 1);
    assert_eq!(value["items"][0]["id"], "a-1");
    assert_eq!(value["items"][0]["display_name"], "First");
    assert_eq!(value["items"][0]["owner_id"], 7);
}

#[test]
fn json_empty() {
    assert_eq!(format_snapshot_json(&[]).unwrap(), r#"{"count":0,"items":[]}"#);
}

#[parameterized(
    state = { ClientEvent::StateChanged(ConnectionState::Reconnecting), "state: reconnecting" },
    connected = { ClientEvent::Connected { socket_id: "1.2".into() }, "connected (socket 1.2)" },
    subscribed = { ClientEvent::Subscribed { channel: "q".into() }, "subscribed to q" },
    sub_error = {
        ClientEvent::SubscriptionError { channel: "q".into(), message: "403".into() },
        "subscription to q failed: 403"
    },
    error = { ClientEvent::Error("boom".into()), "warning: boom" },
)]
fn event_lines(event: ClientEvent, expected: &str) {
    assert_eq!(format_event(&event), expected);
}
