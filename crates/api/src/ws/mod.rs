//! WebSocket infrastructure for task notifications.
//!
//! Provides connection management keyed by client address, heartbeat
//! monitoring, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::{event_message, WsManager};
