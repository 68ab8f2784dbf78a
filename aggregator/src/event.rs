use std::collections::HashMap;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::PublishError;

/// An inbound record as published by clients. `event_id` and `timestamp`
/// may be omitted on the wire and are defaulted before the event enters
/// the pipeline; `topic`, `source` and `payload` are required and their
/// absence fails deserialization at the boundary.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    pub topic: String,
    pub event_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub source: String,
    pub payload: HashMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum RawRequest {
    /// Batch of events
    Batch(Vec<RawEvent>),
    /// Single event
    One(RawEvent),
}

impl RawRequest {
    /// Clients post either one event or an array of them, so decoding
    /// always yields a Vec. Relative order within a batch is preserved.
    pub fn from_bytes(bytes: Bytes) -> Result<Vec<RawEvent>, PublishError> {
        tracing::debug!(len = bytes.len(), "decoding publish request");
        Ok(serde_json::from_slice::<RawRequest>(&bytes)?.events())
    }

    pub fn events(self) -> Vec<RawEvent> {
        match self {
            RawRequest::Batch(events) => events,
            RawRequest::One(event) => vec![event],
        }
    }
}

/// One log occurrence, immutable once constructed. The `(topic,
/// event_id)` pair is the event's sole identity: a second arrival under
/// the same pair is a duplicate no matter what the other fields say.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    pub topic: String,
    pub event_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub source: String,
    pub payload: HashMap<String, Value>,
}

impl LogEvent {
    pub fn from_raw(raw: RawEvent) -> LogEvent {
        LogEvent {
            topic: raw.topic,
            event_id: raw
                .event_id
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            timestamp: raw.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
            source: raw.source,
            payload: raw.payload,
        }
    }

    /// Identity key, for logging. Dedup compares the two columns directly.
    pub fn key(&self) -> String {
        format!("{}:{}", self.topic, self.event_id)
    }
}
