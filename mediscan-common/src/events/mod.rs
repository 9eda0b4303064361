//! Event types for MediScan
//!
//! Provides the scan event definitions and the EventBus shared by the
//! upload handler, the analysis orchestrator, and the SSE endpoint.

mod scan_types;

pub use scan_types::{ImageStatus, ScanStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Scan events
///
/// Broadcast via [`EventBus`] and serialized as-is for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// An uploaded image moved to a new lifecycle state
    ImageStatusChanged {
        image_id: Uuid,
        /// Owner of the image; SSE streams filter on this
        user_id: Uuid,
        status: ScanStatus,
        timestamp: DateTime<Utc>,
    },

    /// A prediction record was written
    PredictionCreated {
        prediction_id: Uuid,
        image_id: Uuid,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    pub fn status_changed(image_id: Uuid, user_id: Uuid, status: ScanStatus) -> Self {
        ScanEvent::ImageStatusChanged {
            image_id,
            user_id,
            status,
            timestamp: Utc::now(),
        }
    }

    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::ImageStatusChanged { .. } => "ImageStatusChanged",
            ScanEvent::PredictionCreated { .. } => "PredictionCreated",
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            ScanEvent::ImageStatusChanged { user_id, .. }
            | ScanEvent::PredictionCreated { user_id, .. } => *user_id,
        }
    }

    pub fn image_id(&self) -> Uuid {
        match self {
            ScanEvent::ImageStatusChanged { image_id, .. }
            | ScanEvent::PredictionCreated { image_id, .. } => *image_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel:
/// - Publishing never blocks on slow subscribers
/// - Any number of subscribers (one per open SSE stream)
/// - Lagging subscribers see `RecvError::Lagged` and skip ahead
///
/// # Examples
///
/// ```
/// use mediscan_common::events::{EventBus, ScanEvent, ScanStatus};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ScanEvent::status_changed(
///     Uuid::new_v4(),
///     Uuid::new_v4(),
///     ScanStatus::Pending,
/// ));
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of receivers, or an error when nobody is listening.
    pub fn emit(
        &self,
        event: ScanEvent,
    ) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::{DiagnosisLabel, Severity};

    #[tokio::test]
    async fn test_event_bus_delivers_to_all_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let image_id = Uuid::new_v4();
        let sent = bus
            .emit(ScanEvent::status_changed(image_id, Uuid::new_v4(), ScanStatus::Pending))
            .unwrap();
        assert_eq!(sent, 2);

        assert_eq!(rx1.recv().await.unwrap().image_id(), image_id);
        assert_eq!(rx2.recv().await.unwrap().image_id(), image_id);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let event = ScanEvent::status_changed(Uuid::new_v4(), Uuid::new_v4(), ScanStatus::Pending);
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_completed_event_json_shape() {
        let event = ScanEvent::status_changed(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ScanStatus::Completed {
                prediction_id: Uuid::new_v4(),
                primary_diagnosis: DiagnosisLabel::Pneumonia,
                primary_confidence: 72.4,
                severity: Severity::High,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ImageStatusChanged");
        assert_eq!(json["status"]["state"], "Completed");
        assert_eq!(json["status"]["primary_diagnosis"], "Pneumonia");
        assert_eq!(json["status"]["severity"], "high");
        assert_eq!(event.event_type(), "ImageStatusChanged");
    }
}
