use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    VehicleAssigned,
    ProviderAssigned,
    StatusChanged,
    Delivered,
    Failed,
    Cancelled,
    TaskOpened,
    TaskCompleted,
    ReminderDue,
}

/// Fire-and-forget lifecycle notification for downstream consumers
/// (analytics, customer notifications). Publication never blocks or
/// fails a state transition.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryEvent {
    pub delivery_id: Uuid,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeliveryEvent {
    pub fn new(delivery_id: Uuid, kind: EventKind, at: DateTime<Utc>) -> Self {
        Self {
            delivery_id,
            kind,
            at,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub fn publish(tx: &broadcast::Sender<DeliveryEvent>, event: DeliveryEvent) {
    // A send error just means nobody is subscribed right now.
    if let Err(err) = tx.send(event) {
        tracing::debug!(error = %err, "event dropped: no subscribers");
    }
}
