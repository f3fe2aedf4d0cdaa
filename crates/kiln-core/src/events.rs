//! Fire-and-forget event bus for observability.
//!
//! Events fan out to every live subscriber over a [`tokio::sync::broadcast`]
//! channel. Publishing never blocks and never fails: with no subscribers the
//! event is simply dropped from the channel, and a subscriber that falls
//! behind loses the oldest events. A bounded history ring is kept alongside
//! so polling consumers can read recent activity without subscribing.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default number of events retained in the history ring.
pub const DEFAULT_HISTORY_SIZE: usize = 500;

/// Kinds of events published by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "job.submitted")]
    JobSubmitted,
    #[serde(rename = "job.dispatched")]
    JobDispatched,
    #[serde(rename = "job.progress")]
    JobProgress,
    #[serde(rename = "job.completed")]
    JobCompleted,
    #[serde(rename = "job.failed")]
    JobFailed,
    #[serde(rename = "job.cancelled")]
    JobCancelled,
    #[serde(rename = "device.registered")]
    DeviceRegistered,
    #[serde(rename = "device.unregistered")]
    DeviceUnregistered,
    #[serde(rename = "scheduler.started")]
    SchedulerStarted,
    #[serde(rename = "scheduler.stopped")]
    SchedulerStopped,
}

impl EventType {
    /// Returns the dotted wire name of this event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::JobSubmitted => "job.submitted",
            Self::JobDispatched => "job.dispatched",
            Self::JobProgress => "job.progress",
            Self::JobCompleted => "job.completed",
            Self::JobFailed => "job.failed",
            Self::JobCancelled => "job.cancelled",
            Self::DeviceRegistered => "device.registered",
            Self::DeviceUnregistered => "device.unregistered",
            Self::SchedulerStarted => "scheduler.started",
            Self::SchedulerStopped => "scheduler.stopped",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What happened.
    pub event_type: EventType,
    /// Event payload.
    pub data: Map<String, Value>,
    /// Component that published the event.
    pub source: String,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates a new event stamped with the current time.
    ///
    /// Non-object payloads are wrapped under a `"value"` key.
    pub fn new(event_type: EventType, data: Value, source: impl Into<String>) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        Self {
            event_type,
            data,
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns a string field from the payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Shared publish/subscribe bus. Share it behind an `Arc`.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    history: Mutex<VecDeque<Event>>,
    history_size: usize,
}

impl EventBus {
    /// Creates a bus with the given channel capacity and history size.
    pub fn new(capacity: usize, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            history_size,
        }
    }

    /// Publishes an event. Never blocks, never fails.
    pub fn publish(&self, event_type: EventType, data: Value, source: &str) {
        self.publish_event(Event::new(event_type, data, source));
    }

    /// Publishes a pre-built event.
    pub fn publish_event(&self, event: Event) {
        if self.history_size > 0 {
            let mut history = self.history.lock();
            if history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let event_type = event.event_type;
        // An error here only means nobody is listening right now.
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(event_type = %event_type, receivers, "Event published");
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns up to `limit` most recent events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Returns up to `limit` most recent events of one type, oldest first.
    pub fn recent_of_type(&self, event_type: EventType, limit: usize) -> Vec<Event> {
        let history = self.history.lock();
        let mut matching: Vec<Event> = history
            .iter()
            .rev()
            .filter(|e| e.event_type == event_type)
            .take(limit)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    /// Drops all retained history.
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY, DEFAULT_HISTORY_SIZE)
    }
}
