//! Fan-out of task lifecycle events inside one process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Who a [`TaskEvent`] is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum Audience {
    /// Connections opened from this client address.
    Origin(String),
    /// Every open connection.
    Everyone,
}

/// One notification on its way to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Wire name, e.g. `task-progress`.
    pub event_type: String,
    pub audience: Audience,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn for_origin(
        origin: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::build(Audience::Origin(origin.into()), event_type.into(), payload)
    }

    pub fn for_everyone(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::build(Audience::Everyone, event_type.into(), payload)
    }

    fn build(audience: Audience, event_type: String, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            audience,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// The client address this event is addressed to, if it is directed.
    pub fn origin(&self) -> Option<&str> {
        match &self.audience {
            Audience::Origin(origin) => Some(origin),
            Audience::Everyone => None,
        }
    }
}

/// Slots kept per subscriber before the slowest one starts lagging.
///
/// Progress ticks dominate the traffic; a few hundred covers several
/// minutes of one task even with nobody draining the channel.
const DEFAULT_CAPACITY: usize = 512;

/// Broadcast channel shared as `Arc<EventBus>` by the pipeline and the
/// notification router.
///
/// Events published while nobody is subscribed are dropped. Subscribers
/// that fall more than the capacity behind lose the oldest events and see
/// `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Hand `event` to every subscriber and return how many there were.
    pub fn publish(&self, event: TaskEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(dropped)) => {
                tracing::trace!(event_type = %dropped.event_type, "No subscribers, event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
