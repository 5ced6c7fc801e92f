use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::lifecycle::{self, ActionContext};
use crate::error::AppError;
use crate::models::route::{DeliveryRoute, RouteStatus};
use crate::models::vehicle::VehicleStatus;
use crate::state::AppState;
use crate::store::Mutation;

pub fn create_route(
    state: &AppState,
    vehicle_id: Option<Uuid>,
    route_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DeliveryRoute, AppError> {
    if let Some(vehicle_id) = vehicle_id {
        state.vehicles.get(vehicle_id)?;
    }
    let route = DeliveryRoute::new(vehicle_id, route_date, now);
    state.routes.insert(route.id, route.clone());
    Ok(route)
}

pub fn set_planning(
    state: &AppState,
    route_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    distance_km: f64,
    order_count: u32,
    now: DateTime<Utc>,
) -> Result<DeliveryRoute, AppError> {
    state.routes.update(route_id, None, |route| {
        route.set_planning(start, end, distance_km, order_count, now)?;
        Ok(Mutation::Changed(route.clone()))
    })
}

/// Stamps the route's vehicle onto each delivery through the state
/// machine, so every assignment lands in the audit trail.
pub fn assign_orders(
    state: &AppState,
    route_id: Uuid,
    delivery_ids: &[Uuid],
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, AppError> {
    let route = state.routes.get(route_id)?;
    if route.status != RouteStatus::Planned {
        return Err(AppError::InvalidRouteState {
            route_id,
            status: route.status,
            action: "assign orders",
        });
    }
    let vehicle_id = route.vehicle_id.ok_or(AppError::Validation {
        field: "vehicle_id",
        message: "route has no vehicle to assign orders to".to_string(),
    })?;

    let mut assigned = Vec::with_capacity(delivery_ids.len());
    for &delivery_id in delivery_ids {
        lifecycle::assign_vehicle(
            state,
            delivery_id,
            vehicle_id,
            Some(route_id),
            None,
            ctx,
            now,
        )?;
        assigned.push(delivery_id);
    }

    info!(route_id = %route_id, orders = assigned.len(), "orders assigned to route");
    Ok(assigned)
}

/// One vehicle runs one route at a time; starting flips it on-route.
pub fn start_route(
    state: &AppState,
    route_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DeliveryRoute, AppError> {
    let route = state.routes.get(route_id)?;
    if let Some(vehicle_id) = route.vehicle_id {
        let conflict = state.routes.list().into_iter().any(|other| {
            other.id != route_id
                && other.vehicle_id == Some(vehicle_id)
                && other.status == RouteStatus::InProgress
        });
        if conflict {
            return Err(AppError::VehicleBusy { vehicle_id });
        }
    }

    let route = state.routes.update(route_id, None, |route| {
        route.start(now)?;
        Ok(Mutation::Changed(route.clone()))
    })?;

    if let Some(vehicle_id) = route.vehicle_id {
        state.vehicles.update(vehicle_id, None, |vehicle| {
            vehicle.status = VehicleStatus::OnRoute;
            vehicle.updated_at = now;
            Ok(Mutation::Changed(()))
        })?;
    }

    info!(route_id = %route_id, "route started");
    Ok(route)
}

pub fn complete_route(
    state: &AppState,
    route_id: Uuid,
    actual_distance_km: f64,
    actual_delivered: u32,
    now: DateTime<Utc>,
) -> Result<DeliveryRoute, AppError> {
    let route = state.routes.update(route_id, None, |route| {
        route.complete(actual_distance_km, actual_delivered, now)?;
        Ok(Mutation::Changed(route.clone()))
    })?;

    release_vehicle(state, &route, now)?;

    info!(
        route_id = %route_id,
        efficiency = route.efficiency(),
        "route completed"
    );
    Ok(route)
}

pub fn cancel_route(
    state: &AppState,
    route_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DeliveryRoute, AppError> {
    let was_in_progress = state.routes.get(route_id)?.status == RouteStatus::InProgress;

    let route = state.routes.update(route_id, None, |route| {
        route.cancel(now)?;
        Ok(Mutation::Changed(route.clone()))
    })?;

    if was_in_progress {
        release_vehicle(state, &route, now)?;
    }
    Ok(route)
}

fn release_vehicle(
    state: &AppState,
    route: &DeliveryRoute,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if let Some(vehicle_id) = route.vehicle_id {
        state.vehicles.update(vehicle_id, None, |vehicle| {
            if vehicle.status == VehicleStatus::OnRoute {
                vehicle.status = VehicleStatus::Active;
                vehicle.updated_at = now;
            }
            Ok(Mutation::Changed(()))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    use super::{complete_route, create_route, set_planning, start_route};
    use crate::models::vehicle::{DeliveryVehicle, VehicleStatus};
    use crate::state::AppState;

    fn vehicle() -> DeliveryVehicle {
        let now = Utc::now();
        DeliveryVehicle {
            id: Uuid::new_v4(),
            plate: "1กข-2345".to_string(),
            vehicle_type: "van".to_string(),
            brand: None,
            model: None,
            year: None,
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

    fn route_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn one_vehicle_one_active_route() {
        let state = AppState::new(Vec::new(), Vec::new(), 16).unwrap();
        let v = vehicle();
        let vehicle_id = v.id;
        state.vehicles.insert(vehicle_id, v);
        let now = Utc::now();

        let first = create_route(&state, Some(vehicle_id), route_date(), now).unwrap();
        let second = create_route(&state, Some(vehicle_id), route_date(), now).unwrap();
        for id in [first.id, second.id] {
            set_planning(&state, id, now, now + Duration::hours(6), 40.0, 10, now).unwrap();
        }

        start_route(&state, first.id, now).unwrap();
        assert_eq!(
            state.vehicles.get(vehicle_id).unwrap().status,
            VehicleStatus::OnRoute
        );

        let err = start_route(&state, second.id, now).unwrap_err();
        assert_eq!(err.kind(), "vehicle_busy");
    }

    #[test]
    fn completing_the_route_releases_the_vehicle() {
        let state = AppState::new(Vec::new(), Vec::new(), 16).unwrap();
        let v = vehicle();
        let vehicle_id = v.id;
        state.vehicles.insert(vehicle_id, v);
        let now = Utc::now();

        let route = create_route(&state, Some(vehicle_id), route_date(), now).unwrap();
        set_planning(&state, route.id, now, now + Duration::hours(6), 40.0, 10, now).unwrap();
        start_route(&state, route.id, now).unwrap();

        let done =
            complete_route(&state, route.id, 38.0, 8, now + Duration::hours(5)).unwrap();
        assert_eq!(done.efficiency(), 80.0);
        assert_eq!(
            state.vehicles.get(vehicle_id).unwrap().status,
            VehicleStatus::Active
        );
    }
}
