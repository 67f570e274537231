//! Attendance event bus.
//!
//! Successful registrations publish an [`AttendanceEvent`] for live-room
//! consumers (a projector view subscribes and shows arrivals as they scan).
//! Publishing is fire-and-forget: with no subscribers the event is dropped,
//! and a slow subscriber lagging off the ring buffer never blocks the
//! registration that produced the event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// A registration that just happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// The QR code that was scanned.
    pub qr_code: String,
    /// Attendance type name, for display.
    pub type_name: String,
    /// Who was registered (display name or phone).
    pub display_name: String,
    /// `qr_bot` or `manual`.
    pub method: String,
    pub timestamp: DateTime<Utc>,
}

/// Publish/subscribe bus for [`AttendanceEvent`]s, backed by
/// [`tokio::sync::broadcast`]. Cheaply cloneable; events are `Arc`-wrapped
/// so fan-out never clones the payload.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<AttendanceEvent>>,
}

impl EventBus {
    /// Create a bus with the given ring-buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Fire-and-forget: the send error (no receivers) is
    /// deliberately swallowed.
    pub fn publish(&self, event: AttendanceEvent) {
        debug!(qr = %event.qr_code, who = %event.display_name, "attendance event");
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AttendanceEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
