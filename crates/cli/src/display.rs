// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Formatting for snapshots and lifecycle events.

use qs_client::ClientEvent;
use qs_core::item::CREATED_AT_FORMAT;
use qs_core::QueueItem;
use serde::Serialize;

const NAME_WIDTH: usize = 24;
const CLINIC_WIDTH: usize = 18;

/// Shape of one `--json` line.
#[derive(Serialize)]
struct SnapshotLine<'a> {
    count: usize,
    items: &'a [QueueItem],
}

/// Formats a snapshot as one JSON line.
pub fn format_snapshot_json(items: &[QueueItem]) -> serde_json::Result<String> {
    serde_json::to_string(&SnapshotLine {
        count: items.len(),
        items,
    })
}

/// Formats a snapshot as a table, newest first.
pub fn format_snapshot_table(items: &[QueueItem]) -> String {
    if items.is_empty() {
        return "(queue empty)\n".to_string();
    }

    let id_width = items
        .iter()
        .map(|item| item.id.chars().count())
        .max()
        .unwrap_or(0)
        .max("ID".len());

    let mut out = format!(
        "{:<id_width$}  {:<NAME_WIDTH$}  {:<CLINIC_WIDTH$}  {:<19}  ROOM\n",
        "ID", "NAME", "CLINIC", "CREATED"
    );
    for item in items {
        out.push_str(&format!(
            "{:<id_width$}  {:<NAME_WIDTH$}  {:<CLINIC_WIDTH$}  {}  {}\n",
            item.id,
            truncate(&item.display_name, NAME_WIDTH),
            truncate(&item.clinic_label, CLINIC_WIDTH),
            item.created_at.format(CREATED_AT_FORMAT),
            item.room_name.as_deref().unwrap_or("-"),
        ));
    }
    out.push_str(&format!("{} item(s)\n", items.len()));
    out
}

/// Formats a lifecycle event as a single stderr line.
pub fn format_event(event: &ClientEvent) -> String {
    match event {
        ClientEvent::StateChanged(state) => format!("state: {}", state),
        ClientEvent::Connected { socket_id } => format!("connected (socket {})", socket_id),
        ClientEvent::Subscribed { channel } => format!("subscribed to {}", channel),
        ClientEvent::SubscriptionError { channel, message } => {
            format!("subscription to {} failed: {}", channel, message)
        }
        ClientEvent::Error(message) => format!("warning: {}", message),
    }
}

/// Cuts `s` to `width` chars, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
