use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Time between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Ping every client each `interval` until `cancel` fires.
///
/// Bots tend to vanish without a Close frame; each round also prunes
/// connections whose send loop has already exited.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick is immediate; nobody needs a ping at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let pruned = ws_manager.ping_all().await;
                    let remaining = ws_manager.connection_count().await;
                    if pruned > 0 {
                        tracing::info!(pruned, remaining, "Pruned stale WebSocket connections");
                    } else {
                        tracing::debug!(remaining, "WebSocket heartbeat ping");
                    }
                }
            }
        }

        tracing::debug!("WebSocket heartbeat stopped");
    })
}
