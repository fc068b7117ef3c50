//! Where lifecycle notifications go.
//!
//! Delivery is fire-and-forget: a sink never reports failure back to the
//! caller, and nothing in the pipeline waits on a client.

use crate::bus::{EventBus, TaskEvent};

pub trait NotificationSink: Send + Sync + 'static {
    /// Deliver `event` to the client(s) connected from `origin`.
    fn notify(&self, origin: &str, event: &str, payload: serde_json::Value);

    /// Deliver `event` to every connected client.
    fn broadcast(&self, event: &str, payload: serde_json::Value);
}

impl NotificationSink for EventBus {
    fn notify(&self, origin: &str, event: &str, payload: serde_json::Value) {
        tracing::debug!(origin, event, "Publishing task event");
        self.publish(TaskEvent::for_origin(origin, event, payload));
    }

    fn broadcast(&self, event: &str, payload: serde_json::Value) {
        tracing::debug!(event, "Broadcasting event");
        self.publish(TaskEvent::for_everyone(event, payload));
    }
}
