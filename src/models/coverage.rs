use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A geographic scope with its delivery policy. Seeded from
/// configuration data; the service never hard-codes geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageArea {
    pub province: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub subdistrict: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub self_delivery: bool,
    #[serde(default)]
    pub route_code: Option<String>,
    pub base_fee: f64,
    pub per_km_rate: f64,
    #[serde(default)]
    pub free_delivery_threshold: Option<f64>,
    #[serde(default)]
    pub same_day_supported: bool,
    #[serde(default)]
    pub daily_capacity: Option<u32>,
    pub active: bool,
    #[serde(default)]
    pub auto_assign: bool,
}

impl CoverageArea {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.province.trim().is_empty() {
            return Err(AppError::Validation {
                field: "province",
                message: "coverage area province must not be empty".to_string(),
            });
        }
        if self.base_fee < 0.0 || self.per_km_rate < 0.0 {
            return Err(AppError::Validation {
                field: "base_fee",
                message: format!("coverage area {} has negative pricing", self.province),
            });
        }
        // An activated self-delivery area must be routable.
        if self.active
            && self.self_delivery
            && self
                .route_code
                .as_deref()
                .is_none_or(|r| r.trim().is_empty())
        {
            return Err(AppError::Validation {
                field: "route_code",
                message: format!(
                    "self-delivery area {} requires a route code",
                    self.province
                ),
            });
        }
        Ok(())
    }

    /// Zero once the order value crosses the free-delivery threshold.
    pub fn delivery_fee(&self, distance_km: f64, order_value: f64) -> f64 {
        if let Some(threshold) = self.free_delivery_threshold {
            if order_value >= threshold {
                return 0.0;
            }
        }
        self.base_fee + distance_km * self.per_km_rate
    }
}
