use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Planned,
    Dispatched,
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Failed | DeliveryStatus::Cancelled
        )
    }

    /// The lifecycle table. Anything not listed here is rejected.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Pending, Dispatched | Planned | Failed | Cancelled)
                | (Planned, InTransit | Failed | Cancelled)
                | (Dispatched, InTransit | Failed)
                | (InTransit, Delivered)
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Planned => "planned",
            DeliveryStatus::Dispatched => "dispatched",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    SelfDelivery,
    ThirdParty,
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMethod::SelfDelivery => f.write_str("self_delivery"),
            DeliveryMethod::ThirdParty => f.write_str("third_party"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub province: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub subdistrict: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

/// Whether a state-machine call actually changed the row. Idempotent
/// repeats (a carrier webhook replaying a status) come back as `NoOp`
/// so no snapshot or event is emitted for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub address: DeliveryAddress,
    pub method: DeliveryMethod,
    pub provider_code: Option<String>,
    pub vehicle_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub tracking_number: Option<String>,
    pub provider_order_ref: Option<String>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub planned_delivery_time: Option<DateTime<Utc>>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub weight_kg: f64,
    pub distance_km: f64,
    pub order_value: f64,
    pub delivery_fee: f64,
    pub cod_amount: f64,
    pub same_day: bool,
    pub status: DeliveryStatus,
    pub requires_manual_coordination: bool,
    pub active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    pub fn can_cancel(&self) -> bool {
        matches!(
            self.status,
            DeliveryStatus::Pending | DeliveryStatus::Planned
        )
    }

    pub fn can_update(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Applies one status transition. Repeating the current status is an
    /// idempotent no-op; anything outside the lifecycle table is an
    /// `InvalidStatusTransition`. Entering dispatched/in_transit stamps
    /// the pickup time, entering delivered stamps the delivery time.
    pub fn transition(
        &mut self,
        next: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppError> {
        if next == self.status {
            return Ok(TransitionOutcome::NoOp);
        }

        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidStatusTransition {
                delivery_id: self.id,
                from: self.status,
                to: next,
            });
        }

        match next {
            DeliveryStatus::Dispatched | DeliveryStatus::InTransit => {
                if self.actual_pickup_time.is_none() {
                    self.actual_pickup_time = Some(now);
                }
            }
            DeliveryStatus::Delivered => {
                if self.actual_delivery_time.is_none() {
                    self.actual_delivery_time = Some(now);
                }
            }
            _ => {}
        }

        self.status = next;
        if next.is_terminal() {
            self.active = false;
        }
        self.updated_at = now;

        Ok(TransitionOutcome::Applied)
    }

    /// Vehicle assignment is only meaningful before the shipment moves.
    pub fn assign_vehicle(
        &mut self,
        vehicle_id: Uuid,
        route_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !matches!(
            self.status,
            DeliveryStatus::Pending | DeliveryStatus::Planned
        ) {
            return Err(AppError::InvalidDeliveryState {
                delivery_id: self.id,
                status: self.status,
                action: "assign vehicle",
            });
        }

        self.vehicle_id = Some(vehicle_id);
        self.route_id = route_id;
        self.updated_at = now;
        Ok(())
    }

    pub fn assign_provider(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if !matches!(
            self.status,
            DeliveryStatus::Pending | DeliveryStatus::Planned | DeliveryStatus::Dispatched
        ) {
            return Err(AppError::InvalidDeliveryState {
                delivery_id: self.id,
                status: self.status,
                action: "assign provider",
            });
        }

        self.provider_code = Some(code.to_string());
        self.method = DeliveryMethod::ThirdParty;
        self.updated_at = now;
        Ok(())
    }

    /// Records the carrier's acceptance. Safe to replay with the same
    /// reference; an existing tracking number is never overwritten with
    /// a different one silently.
    pub fn set_tracking(
        &mut self,
        tracking_number: Option<String>,
        provider_order_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;

        if let Some(tracking) = tracking_number {
            if self.tracking_number.as_deref() != Some(tracking.as_str()) {
                self.tracking_number = Some(tracking);
                changed = true;
            }
        }
        if let Some(reference) = provider_order_ref {
            if self.provider_order_ref.as_deref() != Some(reference.as_str()) {
                self.provider_order_ref = Some(reference);
                changed = true;
            }
        }
        if changed {
            self.updated_at = now;
        }
        changed
    }
}
