//! Outbound delivery events.
//!
//! The scheduler hands every progress and arrival event to a
//! [`NotificationSink`]. Sinks are fire-and-forget from the scheduler's point
//! of view: errors are logged by the caller and never retried.

mod fake;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::event::DeliveryEvent;

pub use fake::RecordingSink;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &DeliveryEvent) -> Result<(), NotifyError>;
}

/// Publishes events to every live WebSocket subscriber.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DeliveryEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<DeliveryEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn notify(&self, event: &DeliveryEvent) -> Result<(), NotifyError> {
        // No subscribers is a normal state, not a failure.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use super::{BroadcastSink, NotificationSink};
    use crate::models::delivery::GeoPoint;
    use crate::models::event::{DeliveryEvent, EventKind};

    fn event(kind: EventKind) -> DeliveryEvent {
        DeliveryEvent {
            delivery_id: Uuid::new_v4(),
            kind,
            position: GeoPoint::new(0.5, 0.5),
            target: Some("https://shop.example/hooks".to_string()),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn broadcast_sink_without_subscribers_is_ok() {
        let (tx, _) = broadcast::channel(4);
        let sink = BroadcastSink::new(tx);
        assert!(sink.notify(&event(EventKind::Progress)).await.is_ok());
    }

    #[tokio::test]
    async fn broadcast_sink_reaches_subscribers() {
        let (tx, _) = broadcast::channel(4);
        let mut rx = tx.subscribe();
        let sink = BroadcastSink::new(tx);

        let sent = event(EventKind::Arrived);
        sink.notify(&sent).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.delivery_id, sent.delivery_id);
        assert_eq!(received.kind, EventKind::Arrived);
    }
}
