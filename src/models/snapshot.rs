use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{DeliveryMethod, DeliveryOrder, DeliveryStatus};

/// What happened, with only the fields relevant to that transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    Created {
        method: DeliveryMethod,
        delivery_fee: f64,
    },
    Assigned {
        vehicle_id: Uuid,
        route_id: Option<Uuid>,
    },
    ProviderUpdated {
        provider_code: String,
    },
    PickedUp,
    InTransit,
    Delivered,
    Failed {
        reason: Option<String>,
    },
    Cancelled {
        reason: Option<String>,
    },
    StatusUpdated {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
}

impl SnapshotEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SnapshotEvent::Created { .. } => "created",
            SnapshotEvent::Assigned { .. } => "assigned",
            SnapshotEvent::ProviderUpdated { .. } => "provider_updated",
            SnapshotEvent::PickedUp => "picked_up",
            SnapshotEvent::InTransit => "in_transit",
            SnapshotEvent::Delivered => "delivered",
            SnapshotEvent::Failed { .. } => "failed",
            SnapshotEvent::Cancelled { .. } => "cancelled",
            SnapshotEvent::StatusUpdated { .. } => "status_updated",
        }
    }

    pub fn for_transition(
        from: DeliveryStatus,
        to: DeliveryStatus,
        reason: Option<String>,
    ) -> SnapshotEvent {
        match to {
            DeliveryStatus::Dispatched => SnapshotEvent::PickedUp,
            DeliveryStatus::InTransit => SnapshotEvent::InTransit,
            DeliveryStatus::Delivered => SnapshotEvent::Delivered,
            DeliveryStatus::Failed => SnapshotEvent::Failed { reason },
            DeliveryStatus::Cancelled => SnapshotEvent::Cancelled { reason },
            _ => SnapshotEvent::StatusUpdated { from, to },
        }
    }
}

/// Immutable audit record: the tagged event plus a full typed capture
/// of the order at that instant, chained to the previous snapshot.
/// The duplicated quick-access columns exist for reporting queries
/// that must not deserialize the full capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub event: SnapshotEvent,
    pub order: DeliveryOrder,
    pub previous_snapshot_id: Option<Uuid>,
    pub triggered_by: String,
    pub triggered_event: String,
    pub triggered_by_user: Option<Uuid>,
    pub status: DeliveryStatus,
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub province: String,
    pub delivery_fee: f64,
    pub provider_code: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDiff {
    pub changes: Vec<FieldChange>,
    pub elapsed_seconds: i64,
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

/// Change-set over the tracked fields (status, vehicle assignment,
/// fee, provider) between two snapshots of the same delivery.
pub fn compare(current: &DeliverySnapshot, previous: &DeliverySnapshot) -> SnapshotDiff {
    let mut changes = Vec::new();

    if current.status != previous.status {
        changes.push(FieldChange {
            field: "status",
            from: previous.status.to_string(),
            to: current.status.to_string(),
        });
    }
    if current.vehicle_id != previous.vehicle_id {
        changes.push(FieldChange {
            field: "vehicle_id",
            from: display_opt(&previous.vehicle_id),
            to: display_opt(&current.vehicle_id),
        });
    }
    if current.delivery_fee != previous.delivery_fee {
        changes.push(FieldChange {
            field: "delivery_fee",
            from: previous.delivery_fee.to_string(),
            to: current.delivery_fee.to_string(),
        });
    }
    if current.provider_code != previous.provider_code {
        changes.push(FieldChange {
            field: "provider_code",
            from: display_opt(&previous.provider_code),
            to: display_opt(&current.provider_code),
        });
    }

    SnapshotDiff {
        changes,
        elapsed_seconds: (current.recorded_at - previous.recorded_at).num_seconds(),
    }
}
