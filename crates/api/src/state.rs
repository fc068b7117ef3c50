use std::sync::Arc;

use navigator_core::store::ImageStore;
use navigator_events::EventBus;
use navigator_forge::{ForgeApi, ParameterResolver};
use navigator_pipeline::JobScheduler;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: navigator_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Direct client for catalog passthrough and image info.
    pub forge: Arc<ForgeApi>,
    /// Cached catalog lookups, shared with the executor.
    pub resolver: Arc<ParameterResolver>,
    /// Producer-side view of the queue and the running task.
    pub scheduler: Arc<JobScheduler>,
    pub store: Arc<dyn ImageStore>,
    pub event_bus: Arc<EventBus>,
    /// WebSocket connection manager (browser and bot clients).
    pub ws_manager: Arc<WsManager>,
}
