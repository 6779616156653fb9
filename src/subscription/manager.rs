use crate::subscription::registry::{Broadcaster, SubscriberChannel};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Manages a single WebSocket connection's membership in the live set
pub struct ConnectionManager {
    broadcaster: Arc<Broadcaster>,
    /// Pending frames allowed per subscriber before it is dropped as slow
    buffer: usize,
    /// Upper bound on a single socket send
    send_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(broadcaster: Arc<Broadcaster>, buffer: usize, send_timeout: Duration) -> Self {
        Self {
            broadcaster,
            buffer,
            send_timeout,
        }
    }

    /// Handle WebSocket connection lifecycle
    ///
    /// Registers on entry and unregisters on every exit path: client close,
    /// transport error, send failure or timeout, or removal by the
    /// broadcaster.
    pub async fn handle(self, mut socket: WebSocket) {
        let (channel, mut outbound) = SubscriberChannel::new(self.buffer);
        let id = self.broadcaster.register(channel);

        info!(
            subscriber = %id,
            connections = self.broadcaster.count(),
            "WebSocket connection established"
        );

        loop {
            tokio::select! {
                // Handle incoming client messages
                incoming = socket.recv() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            // Heartbeats and anything else clients send are not acted on
                            debug!(subscriber = %id, text = %text, "Ignoring client message");
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(subscriber = %id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                warn!(subscriber = %id, error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            warn!(subscriber = %id, error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Forward queued broadcast frames
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        // Broadcaster dropped this subscriber
                        debug!(subscriber = %id, "Subscriber removed by broadcaster");
                        break;
                    };

                    let send = socket.send(Message::Text(frame.to_string()));
                    match tokio::time::timeout(self.send_timeout, send).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(subscriber = %id, error = %e, "Failed to send realtime message");
                            break;
                        }
                        Err(_) => {
                            warn!(subscriber = %id, "Realtime send timed out");
                            break;
                        }
                    }
                }
            }
        }

        self.broadcaster.unregister(id);
        info!(
            subscriber = %id,
            connections = self.broadcaster.count(),
            "WebSocket connection closed"
        );
    }
}
