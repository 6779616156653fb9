use crate::subscription::protocol::RealtimeMessage;
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Delivery handle for one live connection.
///
/// Holds the sending half of a bounded queue; the connection task owns the
/// receiving half and forwards queued frames to the socket.
#[derive(Clone, Debug)]
pub struct SubscriberChannel {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<str>>,
}

impl SubscriberChannel {
    /// Create a channel whose queue holds at most `capacity` pending frames
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

/// Result of one broadcast call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Subscribers the frame was queued for
    pub delivered: usize,
    /// Subscribers removed because their queue was closed or full
    pub dropped: usize,
}

/// Fan-out registry of live subscriber channels.
///
/// Constructed once at startup and shared by the connection handlers and the
/// simulator.
pub struct Broadcaster {
    channels: DashMap<SubscriberId, mpsc::Sender<Arc<str>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Add a channel to the live set. Registering the same channel twice is a no-op.
    pub fn register(&self, channel: SubscriberChannel) -> SubscriberId {
        let id = channel.id;
        self.channels.insert(id, channel.tx);
        id
    }

    /// Remove a channel. Returns false if it was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.channels.remove(&id).is_some()
    }

    /// Number of live subscribers
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Encode `message` once and queue it for every live subscriber
    pub fn broadcast<T: Serialize>(&self, message: &RealtimeMessage<T>) -> Result<BroadcastOutcome> {
        if self.channels.is_empty() {
            return Ok(BroadcastOutcome::default());
        }

        let json = serde_json::to_string(message).context("Failed to encode realtime message")?;
        Ok(self.broadcast_text(Arc::from(json)))
    }

    /// Queue an already-encoded frame for every live subscriber.
    ///
    /// Iterates over a snapshot of the live set taken at call time. A channel
    /// whose receiver is gone or whose queue is full is unregistered; the
    /// failure is not reported to the client.
    pub fn broadcast_text(&self, text: Arc<str>) -> BroadcastOutcome {
        let targets: Vec<(SubscriberId, mpsc::Sender<Arc<str>>)> = self
            .channels
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut outcome = BroadcastOutcome::default();

        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&text)) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = %id, "Subscriber queue full, dropping subscriber");
                    self.unregister(id);
                    outcome.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %id, "Subscriber closed, dropping subscriber");
                    self.unregister(id);
                    outcome.dropped += 1;
                }
            }
        }

        outcome
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
