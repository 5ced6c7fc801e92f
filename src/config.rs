use std::env;
use std::fs;

use crate::error::AppError;
use crate::models::coverage::CoverageArea;
use crate::models::provider::DeliveryProvider;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub sweep_interval_secs: u64,
    pub event_buffer_size: usize,
    pub providers_file: Option<String>,
    pub coverage_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", 60)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            providers_file: env::var("PROVIDERS_FILE").ok(),
            coverage_file: env::var("COVERAGE_FILE").ok(),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

/// Carrier profiles, from the configured file or the compiled-in seed.
pub fn load_providers(path: Option<&str>) -> Result<Vec<DeliveryProvider>, AppError> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| AppError::Internal(format!("cannot read {path}: {err}")))?,
        None => include_str!("../config/providers.json").to_string(),
    };
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Internal(format!("invalid provider config: {err}")))
}

/// Coverage areas, including which provinces the own fleet serves.
/// Geography is operational data; changing it never needs a rebuild.
pub fn load_coverage(path: Option<&str>) -> Result<Vec<CoverageArea>, AppError> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| AppError::Internal(format!("cannot read {path}: {err}")))?,
        None => include_str!("../config/coverage.json").to_string(),
    };
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Internal(format!("invalid coverage config: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{load_coverage, load_providers};
    use crate::models::provider::IntegrationKind;

    #[test]
    fn embedded_provider_seed_parses_and_validates() {
        let providers = load_providers(None).unwrap();
        assert!(!providers.is_empty());
        for provider in &providers {
            provider.validate().unwrap();
        }
        assert!(providers
            .iter()
            .any(|p| p.integration == IntegrationKind::ManualCoordination));
    }

    #[test]
    fn embedded_coverage_seed_has_the_self_delivery_provinces() {
        let areas = load_coverage(None).unwrap();
        for area in &areas {
            area.validate().unwrap();
        }

        let self_delivery_provinces: Vec<&str> = areas
            .iter()
            .filter(|a| a.self_delivery && a.district.is_none())
            .map(|a| a.province.as_str())
            .collect();
        assert_eq!(self_delivery_provinces.len(), 11);
        assert!(self_delivery_provinces.contains(&"Bangkok"));
        assert!(self_delivery_provinces.contains(&"Chonburi"));
    }
}
