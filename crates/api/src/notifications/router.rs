//! Event-to-WebSocket routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and forwards each
//! [`TaskEvent`] to the connections of its origin, or to every connection
//! when the event is a broadcast.

use std::sync::Arc;

use navigator_events::{Audience, TaskEvent};
use tokio::sync::broadcast;

use crate::ws::{event_message, WsManager};

pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the routing loop until the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<TaskEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    async fn route_event(&self, event: &TaskEvent) {
        let message = event_message(&event.event_type, &event.payload);
        match &event.audience {
            Audience::Origin(origin) => {
                let delivered = self.ws_manager.send_to_origin(origin, message).await;
                tracing::trace!(event_type = %event.event_type, origin = %origin, delivered, "Routed event");
            }
            Audience::Everyone => self.ws_manager.broadcast(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use navigator_events::{EventBus, NotificationSink};

    use super::*;

    #[tokio::test]
    async fn routes_directed_and_broadcast_events() {
        let bus = EventBus::default();
        let manager = Arc::new(WsManager::new());
        let mut mine = manager.add("a".into(), vec!["10.0.0.7".into()]).await;
        let mut other = manager.add("b".into(), vec!["10.0.0.8".into()]).await;

        let handle = tokio::spawn(NotificationRouter::new(Arc::clone(&manager)).run(bus.subscribe()));

        bus.notify("10.0.0.7", "task-started", serde_json::json!({ "job_id": "j" }));
        bus.broadcast("models-refreshed", serde_json::json!({}));
        drop(bus);
        handle.await.unwrap();

        assert!(mine.try_recv().is_ok());
        assert!(mine.try_recv().is_ok());
        assert!(other.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }
}
