use chrono::NaiveTime;
use tracing::info;

use crate::engine::coverage::CoverageResolver;
use crate::engine::registry::ProviderRegistry;
use crate::error::AppError;
use crate::models::order::{DeliveryAddress, DeliveryMethod};
use crate::models::provider::{DeliveryProvider, IntegrationKind};

#[derive(Debug, Clone, Copy)]
pub struct Shipment {
    pub distance_km: f64,
    pub weight_kg: f64,
    pub order_value: f64,
    pub same_day: bool,
    pub cod: bool,
}

#[derive(Debug, Clone)]
pub struct DispatchDecision {
    pub method: DeliveryMethod,
    pub delivery_fee: f64,
    pub route_code: Option<String>,
    pub provider: Option<DeliveryProvider>,
    pub requires_manual_coordination: bool,
}

/// Picks how a shipment gets fulfilled. A self-delivery coverage hit
/// wins outright (vehicle and route come later, from the planner);
/// otherwise the cheapest available third-party provider takes it, and
/// a manual-coordination winner additionally opens a human task.
pub fn decide(
    coverage: &CoverageResolver,
    registry: &ProviderRegistry,
    address: &DeliveryAddress,
    shipment: &Shipment,
    time_of_day: NaiveTime,
) -> Result<DispatchDecision, AppError> {
    if let Some(area) = coverage.resolve(address) {
        let same_day_ok = !shipment.same_day || area.same_day_supported;
        if area.self_delivery && same_day_ok {
            let fee = area.delivery_fee(shipment.distance_km, shipment.order_value);
            info!(
                province = %address.province,
                route = area.route_code.as_deref().unwrap_or("-"),
                fee,
                "self-delivery coverage matched"
            );
            return Ok(DispatchDecision {
                method: DeliveryMethod::SelfDelivery,
                delivery_fee: fee,
                route_code: area.route_code.clone(),
                provider: None,
                requires_manual_coordination: false,
            });
        }
    }

    let (provider, fee) = registry
        .cheapest_available(
            &address.province,
            shipment.distance_km,
            shipment.weight_kg,
            shipment.same_day,
            shipment.cod,
            time_of_day,
        )
        .ok_or_else(|| AppError::NoProviderAvailable {
            province: address.province.clone(),
        })?;

    let requires_manual_coordination =
        provider.integration == IntegrationKind::ManualCoordination;

    info!(
        province = %address.province,
        provider = %provider.code,
        fee,
        manual = requires_manual_coordination,
        "third-party provider selected"
    );

    Ok(DispatchDecision {
        method: DeliveryMethod::ThirdParty,
        delivery_fee: fee,
        route_code: None,
        provider: Some(provider),
        requires_manual_coordination,
    })
}
