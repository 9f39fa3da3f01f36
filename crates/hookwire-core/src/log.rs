//! Webhook delivery log
//!
//! Entries are append-only and capped: the ring keeps the newest
//! `capacity` entries, newest first, evicting the oldest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Default number of log entries retained
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Outcome of a delivery attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Remote answered with a 2xx status
    Success,
    /// Network failure or non-2xx status
    Failed,
    /// Recorded before the attempt finished
    Pending,
}

/// One delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLog {
    /// Generated identifier
    pub id: String,

    /// Consumer the payload was sent to
    pub consumer_id: String,

    /// Producer the payload came from
    pub producer_id: String,

    /// Delivery outcome
    pub status: DeliveryStatus,

    /// Transformed payload that was sent
    pub payload: Value,

    /// Remote response, when one was received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Time of the attempt
    pub timestamp: DateTime<Utc>,
}

impl WebhookLog {
    /// Create a log entry stamped now
    pub fn new(
        consumer_id: impl Into<String>,
        producer_id: impl Into<String>,
        status: DeliveryStatus,
        payload: Value,
    ) -> Self {
        Self {
            id: crate::generate_id(),
            consumer_id: consumer_id.into(),
            producer_id: producer_id.into(),
            status,
            payload,
            response: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the remote response
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    /// Attach a failure description
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Capped, newest-first log buffer.
///
/// Single writer: callers sharing a ring across tasks must serialize
/// access (the in-memory store keeps it behind a mutex).
#[derive(Debug, Clone)]
pub struct LogRing {
    entries: VecDeque<WebhookLog>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogRing {
    /// Create a ring holding at most `capacity` entries (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new entry to the front, evicting the oldest when full
    pub fn push(&mut self, entry: WebhookLog) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries newest first
    pub fn iter(&self) -> impl Iterator<Item = &WebhookLog> {
        self.entries.iter()
    }

    /// Entries for one consumer, newest first
    pub fn for_consumer(&self, consumer_id: &str) -> Vec<WebhookLog> {
        self.entries
            .iter()
            .filter(|l| l.consumer_id == consumer_id)
            .cloned()
            .collect()
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
