// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue projection: the ordered, in-memory view of queue items.
//!
//! Application events arrive as loosely-typed JSON maps. They are matched
//! against the accepted shapes in priority order:
//!
//! 1. remove action (scoped to the local owner)
//! 2. full list under a list key (replaces everything)
//! 3. single item under a wrapper key (insert or replace in place)
//! 4. flat broadcast item (insert or replace in place)
//!
//! Anything else is ignored. The newest item sits at index 0.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::item::{item_id, owner_id, QueueItem};

const ACTION_KEYS: &[&str] = &["action", "type"];
const REMOVE_ACTIONS: &[&str] = &["remove", "removed", "delete", "deleted"];
const LIST_KEYS: &[&str] = &["queue", "items", "scripts"];
const WRAPPER_KEYS: &[&str] = &["item", "script"];

/// A queue mutation decoded from an application payload.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// Remove every item with `id`, if `owner_id` (when present) is ours.
    Remove { id: String, owner_id: Option<i64> },
    /// Replace the whole queue.
    Replace(Vec<QueueItem>),
    /// Insert at the front, or replace an existing item in place.
    Upsert(QueueItem),
}

impl QueueEvent {
    /// Classifies a payload. Returns `None` for unrecognized shapes.
    pub fn classify(payload: &Value, received_at: DateTime<Utc>) -> Option<Self> {
        let map = payload.as_object()?;

        if is_remove(map) {
            let wrapped = wrapped_item(map);
            let id = item_id(map).or_else(|| wrapped.and_then(item_id))?;
            let owner_id = owner_id(map).or_else(|| wrapped.and_then(owner_id));
            return Some(QueueEvent::Remove { id, owner_id });
        }

        if let Some(list) = LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            let items = list
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|entry| QueueItem::from_payload(entry, received_at))
                .collect();
            return Some(QueueEvent::Replace(items));
        }

        // A wrapper without a usable id falls through to the flat shape.
        wrapped_item(map)
            .and_then(|wrapped| QueueItem::from_payload(wrapped, received_at))
            .or_else(|| QueueItem::from_payload(map, received_at))
            .map(QueueEvent::Upsert)
    }
}

fn is_remove(map: &Map<String, Value>) -> bool {
    ACTION_KEYS
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .any(|action| {
            REMOVE_ACTIONS
                .iter()
                .any(|remove| action.trim().eq_ignore_ascii_case(remove))
        })
}

fn wrapped_item(map: &Map<String, Value>) -> Option<&Map<String, Value>> {
    WRAPPER_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_object))
}

/// Outcome of applying one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// `n` items were removed (may be zero when nothing matched).
    Removed(usize),
    /// The queue was replaced with `n` items.
    Replaced(usize),
    /// A new item was placed at the front.
    Inserted,
    /// An existing item was replaced at `index`.
    Updated { index: usize },
    /// The payload was not for us or not a recognized shape.
    Ignored,
}

impl Applied {
    /// Returns true if the snapshot may have changed.
    pub fn is_change(self) -> bool {
        !matches!(self, Applied::Ignored | Applied::Removed(0))
    }
}

/// Ordered queue state with unique ids.
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    items: Vec<QueueItem>,
    /// Locally known identity, used to scope removals.
    owner_id: Option<i64>,
}

impl QueueStore {
    /// Creates an empty store for the given local owner.
    pub fn new(owner_id: Option<i64>) -> Self {
        QueueStore {
            items: Vec::new(),
            owner_id,
        }
    }

    /// Applies a decoded application payload, stamping new items with the
    /// current time when they carry none.
    pub fn apply_event(&mut self, payload: &Value) -> Applied {
        self.apply_event_at(payload, Utc::now())
    }

    /// Applies a payload with an explicit receipt time.
    pub fn apply_event_at(&mut self, payload: &Value, received_at: DateTime<Utc>) -> Applied {
        match QueueEvent::classify(payload, received_at) {
            Some(event) => self.apply(event),
            None => Applied::Ignored,
        }
    }

    /// Applies an already-classified event.
    pub fn apply(&mut self, event: QueueEvent) -> Applied {
        match event {
            QueueEvent::Remove { id, owner_id } => {
                if owner_id.is_some() && owner_id != self.owner_id {
                    return Applied::Ignored;
                }
                let before = self.items.len();
                self.items.retain(|item| item.id != id);
                Applied::Removed(before - self.items.len())
            }
            QueueEvent::Replace(items) => {
                let mut seen = HashSet::new();
                self.items = items
                    .into_iter()
                    .filter(|item| seen.insert(item.id.clone()))
                    .collect();
                Applied::Replaced(self.items.len())
            }
            QueueEvent::Upsert(item) => self.upsert(item),
        }
    }

    fn upsert(&mut self, item: QueueItem) -> Applied {
        match self.items.iter().position(|existing| existing.id == item.id) {
            Some(index) => {
                self.items[index] = item;
                Applied::Updated { index }
            }
            None => {
                self.items.insert(0, item);
                Applied::Inserted
            }
        }
    }

    /// Current items in display order.
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
