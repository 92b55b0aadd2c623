//! In-memory log of processed webhook events.
//!
//! Bounded: once `capacity` events are stored the oldest is dropped.
//! Nothing survives a restart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Events kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Events returned by `GET /events`.
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WebhookPr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetails {
    pub title: String,
    pub user: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub details: EventDetails,
    pub analysis: String,
}

#[derive(Debug)]
struct Inner {
    events: VecDeque<Event>,
    next_id: u64,
}

/// Append-only event store with sequential ids starting at 1.
#[derive(Debug)]
pub struct EventLog {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                events: VecDeque::new(),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Store an event and return it with its assigned id.
    pub async fn record(&self, kind: EventKind, details: EventDetails, analysis: String) -> Event {
        let mut inner = self.inner.write().await;

        let event = Event {
            id: inner.next_id,
            kind,
            timestamp: Utc::now(),
            details,
            analysis,
        };
        inner.next_id += 1;

        if inner.events.len() >= self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(event.clone());
        event
    }

    /// Up to `limit` events, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Event> {
        let inner = self.inner.read().await;
        let mut events: Vec<Event> = inner.events.iter().cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        events
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
