use chrono::NaiveTime;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::provider::DeliveryProvider;

/// Holds every carrier's capability profile, keyed by code. Every
/// provider is validated on the way in, so dispatch can trust what it
/// reads. Providers are deactivated, never removed.
pub struct ProviderRegistry {
    providers: DashMap<String, DeliveryProvider>,
}

impl ProviderRegistry {
    pub fn new(seed: Vec<DeliveryProvider>) -> Result<Self, AppError> {
        let registry = Self {
            providers: DashMap::new(),
        };
        for provider in seed {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    pub fn register(&self, provider: DeliveryProvider) -> Result<(), AppError> {
        provider.validate()?;
        if self.providers.contains_key(&provider.code) {
            return Err(AppError::Validation {
                field: "code",
                message: format!("provider {} already registered", provider.code),
            });
        }
        self.providers.insert(provider.code.clone(), provider);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Result<DeliveryProvider, AppError> {
        self.providers
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound {
                entity: "provider",
                id: code.to_string(),
            })
    }

    pub fn list(&self) -> Vec<DeliveryProvider> {
        let mut providers: Vec<DeliveryProvider> = self
            .providers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        providers.sort_by(|a, b| a.code.cmp(&b.code));
        providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn deactivate(&self, code: &str) -> Result<DeliveryProvider, AppError> {
        let mut entry = self
            .providers
            .get_mut(code)
            .ok_or_else(|| AppError::NotFound {
                entity: "provider",
                id: code.to_string(),
            })?;
        entry.active = false;
        Ok(entry.value().clone())
    }

    /// The cheapest provider that can take this shipment right now.
    /// Fee ties break on provider priority, then code, so selection is
    /// deterministic.
    pub fn cheapest_available(
        &self,
        province: &str,
        distance_km: f64,
        weight_kg: f64,
        same_day: bool,
        cod: bool,
        time_of_day: NaiveTime,
    ) -> Option<(DeliveryProvider, f64)> {
        self.providers
            .iter()
            .filter(|entry| {
                let p = entry.value();
                p.available_for(province, weight_kg, same_day, cod) && p.within_cutoff(time_of_day)
            })
            .map(|entry| {
                let p = entry.value().clone();
                let fee = p.delivery_fee(distance_km, weight_kg, same_day, cod);
                (p, fee)
            })
            .min_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| a.0.priority.cmp(&b.0.priority))
                    .then_with(|| a.0.code.cmp(&b.0.code))
            })
    }
}
