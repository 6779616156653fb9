use crate::subscription::{Broadcaster, ConnectionManager};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub broadcaster: Arc<Broadcaster>,
    /// Frames queued per subscriber before it is dropped as slow
    pub subscriber_buffer: usize,
    pub send_timeout: Duration,
}

/// GET /ws/realtime - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Create WebSocket router
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/ws/realtime", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>) {
    let manager = ConnectionManager::new(
        Arc::clone(&state.broadcaster),
        state.subscriber_buffer,
        state.send_timeout,
    );

    // Handle connection lifecycle
    manager.handle(socket).await;
}
