use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteStatus::Planned => "planned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A planned grouping of self-delivery orders for one vehicle on one
/// date, tracking planned-vs-actual execution. Routing optimization
/// itself happens elsewhere; `optimization_data` is an opaque payload
/// from the external optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRoute {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub route_date: NaiveDate,
    pub planned_start: Option<DateTime<Utc>>,
    pub planned_end: Option<DateTime<Utc>>,
    pub planned_distance_km: Option<f64>,
    pub planned_orders: Option<u32>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub actual_distance_km: Option<f64>,
    pub actual_delivered: Option<u32>,
    #[serde(default)]
    pub optimization_data: Option<serde_json::Value>,
    pub status: RouteStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryRoute {
    pub fn new(vehicle_id: Option<Uuid>, route_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id,
            route_date,
            planned_start: None,
            planned_end: None,
            planned_distance_km: None,
            planned_orders: None,
            actual_start: None,
            actual_end: None,
            actual_distance_km: None,
            actual_delivered: None,
            optimization_data: None,
            status: RouteStatus::Planned,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_planning(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        distance_km: f64,
        order_count: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status != RouteStatus::Planned {
            return Err(AppError::InvalidRouteState {
                route_id: self.id,
                status: self.status,
                action: "plan",
            });
        }
        if end <= start {
            return Err(AppError::Validation {
                field: "planned_end",
                message: "planned end must be after planned start".to_string(),
            });
        }
        if distance_km <= 0.0 {
            return Err(AppError::Validation {
                field: "distance_km",
                message: "planned distance must be positive".to_string(),
            });
        }
        if order_count == 0 {
            return Err(AppError::Validation {
                field: "order_count",
                message: "planned order count must be positive".to_string(),
            });
        }

        self.planned_start = Some(start);
        self.planned_end = Some(end);
        self.planned_distance_km = Some(distance_km);
        self.planned_orders = Some(order_count);
        self.updated_at = now;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.vehicle_id.is_none() {
            return Err(AppError::Validation {
                field: "vehicle_id",
                message: "route cannot start without an assigned vehicle".to_string(),
            });
        }
        if self.status != RouteStatus::Planned {
            return Err(AppError::InvalidRouteState {
                route_id: self.id,
                status: self.status,
                action: "start",
            });
        }
        self.status = RouteStatus::InProgress;
        self.actual_start = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(
        &mut self,
        actual_distance_km: f64,
        actual_delivered: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status != RouteStatus::InProgress {
            return Err(AppError::InvalidRouteState {
                route_id: self.id,
                status: self.status,
                action: "complete",
            });
        }
        if actual_distance_km < 0.0 {
            return Err(AppError::Validation {
                field: "actual_distance_km",
                message: "actual distance must be non-negative".to_string(),
            });
        }
        if let Some(start) = self.actual_start {
            if now <= start {
                return Err(AppError::Validation {
                    field: "actual_end",
                    message: "route end must follow its start".to_string(),
                });
            }
        }

        self.status = RouteStatus::Completed;
        self.actual_end = Some(now);
        self.actual_distance_km = Some(actual_distance_km);
        self.actual_delivered = Some(actual_delivered);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if matches!(self.status, RouteStatus::Completed | RouteStatus::Cancelled) {
            return Err(AppError::InvalidRouteState {
                route_id: self.id,
                status: self.status,
                action: "cancel",
            });
        }
        self.status = RouteStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Delivered-vs-planned percentage; meaningful only once the route
    /// has completed.
    pub fn efficiency(&self) -> f64 {
        if self.status != RouteStatus::Completed {
            return 0.0;
        }
        match (self.planned_orders, self.actual_delivered) {
            (Some(planned), Some(delivered)) if planned > 0 => {
                delivered as f64 / planned as f64 * 100.0
            }
            _ => 0.0,
        }
    }
}
