use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::middleware::client_addr::ClientAddrs;
use crate::state::AppState;
use crate::ws::manager::{event_message, WsManager};

/// Greeting sent to every client right after the upgrade.
const WELCOME_EVENT: &str = "connected";

/// HTTP handler that upgrades the connection to WebSocket.
///
/// The connection is registered under every address the client may be
/// known by, so task events addressed to the requester's origin reach it.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ClientAddrs(addrs): ClientAddrs,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, addrs))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Outbound messages come from the manager channel on a spawned sender
/// task; inbound frames are only drained (clients never send commands).
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, addrs: Vec<String>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, addrs = ?addrs, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone(), addrs).await;
    let (mut sink, mut stream) = socket.split();

    let welcome = event_message(
        WELCOME_EVENT,
        &serde_json::json!({ "message": "Welcome aboard! Connected to Navigator." }),
    );
    if sink.send(welcome).await.is_err() {
        ws_manager.remove(&conn_id).await;
        return;
    }

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
