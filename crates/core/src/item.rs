// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue item model and payload field decoding.
//!
//! Payloads come from several server-side producers that disagree on field
//! names and types, so every field is looked up through a list of aliases and
//! integers are accepted either as JSON numbers or numeric strings.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Format of `created_at` strings produced by the queue backend (UTC).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name used when a payload carries no display name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Float epochs at or beyond this magnitude are rejected rather than cast.
const MAX_EPOCH_FLOAT: f64 = 1e15;

const UUID_KEYS: &[&str] = &["script_uuid", "uuid"];
const SCRIPT_ID_KEYS: &[&str] = &["script_id"];
const NAME_KEYS: &[&str] = &["patient_name", "display_name", "name"];
const CLINIC_KEYS: &[&str] = &["clinic_name", "clinic"];
const CREATED_AT_KEYS: &[&str] = &["created_at", "createdAt"];
const OWNER_KEYS: &[&str] = &["doctor_id", "owner_id"];
const SCRIPT_NUMBER_KEYS: &[&str] = &["script_number"];
const ROOM_KEYS: &[&str] = &["room_name", "room"];

/// One pending entry in the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    /// Stable identifier: the script UUID, or `script_<N>` from the numeric id.
    pub id: String,
    pub display_name: String,
    pub clinic_label: String,
    pub created_at: DateTime<Utc>,
    /// Identity the item belongs to; used to scope removals.
    pub owner_id: Option<i64>,
    pub script_id: Option<i64>,
    pub script_uuid: Option<String>,
    pub script_number: Option<String>,
    pub room_name: Option<String>,
}

impl QueueItem {
    /// Decodes an item from a payload map.
    ///
    /// Returns `None` when neither a UUID nor a numeric script id is present,
    /// since such an item could never be updated or removed again.
    pub fn from_payload(map: &Map<String, Value>, received_at: DateTime<Utc>) -> Option<Self> {
        let id = item_id(map)?;

        Some(QueueItem {
            id,
            display_name: string_field(map, NAME_KEYS).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            clinic_label: string_field(map, CLINIC_KEYS).unwrap_or_default(),
            created_at: created_at(map).unwrap_or(received_at),
            owner_id: owner_id(map),
            script_id: int_field(map, SCRIPT_ID_KEYS),
            script_uuid: string_field(map, UUID_KEYS),
            script_number: text_field(map, SCRIPT_NUMBER_KEYS),
            room_name: string_field(map, ROOM_KEYS),
        })
    }
}

/// Derives the item id: UUID first, then `script_<N>`.
pub fn item_id(map: &Map<String, Value>) -> Option<String> {
    string_field(map, UUID_KEYS)
        .or_else(|| int_field(map, SCRIPT_ID_KEYS).map(|id| format!("script_{}", id)))
}

/// Resolves the owner id carried by a payload, if any.
pub fn owner_id(map: &Map<String, Value>) -> Option<i64> {
    int_field(map, OWNER_KEYS)
}

/// Parses a `created_at` value: backend date string, RFC 3339, or Unix epoch.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            NaiveDateTime::parse_from_str(text, CREATED_AT_FORMAT)
                .map(|naive| naive.and_utc())
                .ok()
                .or_else(|| {
                    DateTime::parse_from_rfc3339(text)
                        .map(|dt| dt.with_timezone(&Utc))
                        .ok()
                })
                .or_else(|| text.parse::<i64>().ok().and_then(from_epoch))
        }
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|secs| secs.is_finite() && secs.abs() < MAX_EPOCH_FLOAT)
                    .map(|secs| secs as i64)
            })
            .and_then(from_epoch),
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() > EPOCH_MILLIS_THRESHOLD.unsigned_abs() {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn created_at(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    CREATED_AT_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(parse_timestamp)
}

/// First non-empty string among `keys`.
fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Like [`string_field`], but numbers are rendered as text.
fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
}

/// First integer among `keys`, accepting numeric strings.
fn int_field(map: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
