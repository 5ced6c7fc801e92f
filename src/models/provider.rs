use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Weight included in the base rate; anything above it pays the
/// per-kilogram surcharge.
pub const WEIGHT_ALLOWANCE_KG: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    /// Bookable through the carrier's API.
    ApiIntegrated,
    /// No booking API; a human arranges pickup by phone/LINE/app.
    ManualCoordination,
    /// On-demand carrier that dispatches a rider on request.
    AutoPickup,
}

/// Ordering doubles as escalation priority: when a provider exposes
/// several channels, the smallest one is how we prefer to reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Phone,
    Line,
    App,
    Email,
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContactChannel::Phone => "phone",
            ContactChannel::Line => "line",
            ContactChannel::App => "app",
            ContactChannel::Email => "email",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPricing {
    pub base_rate: f64,
    pub per_km_rate: f64,
    pub weight_surcharge: f64,
    pub same_day_surcharge: f64,
    pub cod_surcharge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevels {
    pub standard_hours: u32,
    #[serde(default)]
    pub express_hours: Option<u32>,
    #[serde(default)]
    pub same_day: bool,
    #[serde(default)]
    pub cod: bool,
    #[serde(default)]
    pub tracking: bool,
    #[serde(default)]
    pub insurance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryProvider {
    pub code: String,
    pub name: String,
    pub integration: IntegrationKind,
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Provinces this carrier serves. Empty means no restriction.
    #[serde(default)]
    pub coverage_provinces: Vec<String>,
    pub max_weight_kg: f64,
    #[serde(default)]
    pub max_dimension_cm: Option<f64>,
    pub pricing: ProviderPricing,
    pub service: ServiceLevels,
    /// Daily cutoff for same-day pickup requests, time of day.
    #[serde(default)]
    pub cutoff_time: Option<NaiveTime>,
    #[serde(default)]
    pub weekend_service: bool,
    #[serde(default)]
    pub holiday_service: bool,
    #[serde(default)]
    pub contact_channels: BTreeMap<ContactChannel, String>,
    pub active: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub auto_assign: bool,
    #[serde(default)]
    pub requires_approval: bool,
}

impl DeliveryProvider {
    /// Config-time validation. A misconfigured provider is rejected
    /// here, at registration, so it can never silently receive
    /// deliveries at dispatch time.
    pub fn validate(&self) -> Result<(), AppError> {
        let reject = |reason: &str| {
            Err(AppError::ProviderConfig {
                code: self.code.clone(),
                reason: reason.to_string(),
            })
        };

        if self.code.trim().is_empty() {
            return reject("code must not be empty");
        }
        if self.max_weight_kg <= 0.0 {
            return reject("max_weight_kg must be positive");
        }
        if self.pricing.base_rate < 0.0
            || self.pricing.per_km_rate < 0.0
            || self.pricing.weight_surcharge < 0.0
            || self.pricing.same_day_surcharge < 0.0
            || self.pricing.cod_surcharge < 0.0
        {
            return reject("pricing rates must be non-negative");
        }
        if self.integration == IntegrationKind::ManualCoordination
            && self.contact_channels.is_empty()
        {
            return reject("manual coordination requires at least one contact channel");
        }
        if self.integration == IntegrationKind::ApiIntegrated
            && self
                .api_base_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return reject("api integration requires a base url");
        }

        Ok(())
    }

    pub fn delivery_fee(&self, distance_km: f64, weight_kg: f64, same_day: bool, cod: bool) -> f64 {
        let mut fee = self.pricing.base_rate + distance_km * self.pricing.per_km_rate;
        fee += (weight_kg - WEIGHT_ALLOWANCE_KG).max(0.0) * self.pricing.weight_surcharge;
        if same_day {
            fee += self.pricing.same_day_surcharge;
        }
        if cod {
            fee += self.pricing.cod_surcharge;
        }
        fee
    }

    pub fn available_for(&self, province: &str, weight_kg: f64, same_day: bool, cod: bool) -> bool {
        if !self.active {
            return false;
        }
        if weight_kg > self.max_weight_kg {
            return false;
        }
        if same_day && !self.service.same_day {
            return false;
        }
        if cod && !self.service.cod {
            return false;
        }
        if !self.coverage_provinces.is_empty()
            && !self
                .coverage_provinces
                .iter()
                .any(|p| p.eq_ignore_ascii_case(province))
        {
            return false;
        }
        true
    }

    /// Providers without a cutoff accept pickups all day.
    pub fn within_cutoff(&self, now: NaiveTime) -> bool {
        match self.cutoff_time {
            Some(cutoff) => now <= cutoff,
            None => true,
        }
    }
}
