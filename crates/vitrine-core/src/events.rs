//! Upload event bus for UI-facing progress notifications.
//!
//! Aggregates per-item lifecycle events from the upload pipeline into a
//! single broadcast channel. Downstream consumers (progress dialogs,
//! notification badges, telemetry) subscribe independently; a slow or
//! absent consumer never blocks the pipeline.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::defaults;
use crate::id::UploadItemId;
use crate::models::{EntityKind, EntitySummary};

/// Event emitted by the upload pipeline.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// An item entered processing.
    ItemStarted {
        item_id: UploadItemId,
        kind: EntityKind,
    },
    /// Item progress was updated (0–100, monotonic per item).
    ItemProgress { item_id: UploadItemId, pct: u8 },
    /// An item reached terminal success.
    ItemCompleted {
        item_id: UploadItemId,
        entity: EntitySummary,
    },
    /// An item reached terminal failure.
    ItemFailed {
        item_id: UploadItemId,
        error: String,
    },
    /// Every item in a batch reached a terminal outcome.
    BatchFinished { batch_id: Uuid },
}

/// Broadcast bus carrying [`UploadEvent`]s.
#[derive(Clone)]
pub struct UploadEventBus {
    tx: broadcast::Sender<UploadEvent>,
}

impl UploadEventBus {
    /// Create a bus with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event. Dropped silently when no subscriber is listening.
    pub fn emit(&self, event: UploadEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for UploadEventBus {
    fn default() -> Self {
        Self::with_capacity(defaults::EVENT_BUS_CAPACITY)
    }
}
