pub mod dispatch;
pub mod drivers;

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

/// One per-recipient, per-channel message. Channels follow the room naming
/// used across the platform: `user:<id>`, `driver:<id>`, `admin:alerts`.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(
        channel: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            event: event.into(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct SinkError(pub String);

/// Pluggable delivery transport. Implementations must never block the
/// triggering state transition; the dispatcher spawns a task per delivery
/// and only logs failures.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Fans deliveries into the process-wide broadcast channel feeding the
/// websocket surface. Having no subscribers is normal, not an error.
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<Notification>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn deliver(&self, notification: Notification) -> Result<(), SinkError> {
        let _ = self.tx.send(notification);
        Ok(())
    }
}

/// Stub sink that records every delivery; used to exercise the dispatch
/// logic without any transport.
pub struct RecordingSink {
    deliveries: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.deliveries.lock().expect("recording sink lock").clone()
    }

    pub fn for_channel(&self, channel: &str) -> Vec<Notification> {
        self.snapshot()
            .into_iter()
            .filter(|n| n.channel == channel)
            .collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: Notification) -> Result<(), SinkError> {
        self.deliveries
            .lock()
            .expect("recording sink lock")
            .push(notification);
        Ok(())
    }
}
