//! Navigator event bus and notification seam.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TaskEvent`] -- the envelope every lifecycle notification travels in.
//! - [`NotificationSink`] -- what the pipeline talks to when it needs to tell
//!   clients something. The bus is the production implementation.

pub mod bus;
pub mod sink;

pub use bus::{Audience, EventBus, TaskEvent};
pub use sink::NotificationSink;
