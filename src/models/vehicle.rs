use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Active,
    Inactive,
    Maintenance,
    OnRoute,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Inactive => "inactive",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::OnRoute => "on_route",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryVehicle {
    pub id: Uuid,
    pub plate: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    pub max_weight_kg: f64,
    pub max_volume_m3: f64,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    pub status: VehicleStatus,
    #[serde(default)]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryVehicle {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.plate.trim().is_empty() {
            return Err(AppError::Validation {
                field: "plate",
                message: "vehicle plate must not be empty".to_string(),
            });
        }
        if self.max_weight_kg <= 0.0 {
            return Err(AppError::Validation {
                field: "max_weight_kg",
                message: "vehicle capacity must be positive".to_string(),
            });
        }
        if self.max_volume_m3 <= 0.0 {
            return Err(AppError::Validation {
                field: "max_volume_m3",
                message: "vehicle volume must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn available_for_route(&self) -> bool {
        self.status == VehicleStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{DeliveryVehicle, VehicleStatus};

    fn vehicle() -> DeliveryVehicle {
        let now = Utc::now();
        DeliveryVehicle {
            id: Uuid::new_v4(),
            plate: "1กข-2345".to_string(),
            vehicle_type: "van".to_string(),
            brand: Some("Toyota".to_string()),
            model: Some("Hiace".to_string()),
            year: Some(2022),
            max_weight_kg: 1000.0,
            max_volume_m3: 8.0,
            driver_id: None,
            status: VehicleStatus::Active,
            last_maintenance: None,
            next_maintenance: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn capacity_must_be_positive() {
        let mut v = vehicle();
        assert!(v.validate().is_ok());

        v.max_weight_kg = 0.0;
        assert!(v.validate().is_err());

        v.max_weight_kg = 1000.0;
        v.max_volume_m3 = -1.0;
        assert!(v.validate().is_err());
    }

    #[test]
    fn only_active_vehicles_take_routes() {
        let mut v = vehicle();
        assert!(v.available_for_route());

        v.status = VehicleStatus::Maintenance;
        assert!(!v.available_for_route());

        v.status = VehicleStatus::OnRoute;
        assert!(!v.available_for_route());
    }
}
