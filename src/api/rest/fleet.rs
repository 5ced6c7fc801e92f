use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::ActionContext;
use crate::engine::routes;
use crate::error::AppError;
use crate::models::route::DeliveryRoute;
use crate::models::vehicle::{DeliveryVehicle, VehicleStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles", post(create_vehicle).get(list_vehicles))
        .route("/vehicles/:id", get(get_vehicle))
        .route("/routes", post(create_route).get(list_routes))
        .route("/routes/:id", get(get_route))
        .route("/routes/:id/planning", post(set_planning))
        .route("/routes/:id/assign-orders", post(assign_orders))
        .route("/routes/:id/start", post(start_route))
        .route("/routes/:id/complete", post(complete_route))
        .route("/routes/:id/cancel", post(cancel_route))
}

#[derive(Deserialize)]
pub struct CreateVehicleRequest {
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
}

async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<Json<DeliveryVehicle>, AppError> {
    let now = Utc::now();
    let vehicle = DeliveryVehicle {
        id: Uuid::new_v4(),
        plate: payload.plate,
        vehicle_type: payload.vehicle_type,
        brand: payload.brand,
        model: payload.model,
        year: payload.year,
        max_weight_kg: payload.max_weight_kg,
        max_volume_m3: payload.max_volume_m3,
        driver_id: payload.driver_id,
        status: VehicleStatus::Active,
        last_maintenance: None,
        next_maintenance: None,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    vehicle.validate()?;

    state.vehicles.insert(vehicle.id, vehicle.clone());
    Ok(Json(vehicle))
}

async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryVehicle>> {
    let mut vehicles = state.vehicles.list();
    vehicles.sort_by(|a, b| a.plate.cmp(&b.plate));
    Json(vehicles)
}

async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryVehicle>, AppError> {
    Ok(Json(state.vehicles.get(id)?))
}

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
    pub route_date: NaiveDate,
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRouteRequest>,
) -> Result<Json<DeliveryRoute>, AppError> {
    let route = routes::create_route(&state, payload.vehicle_id, payload.route_date, Utc::now())?;
    Ok(Json(route))
}

async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryRoute>> {
    let mut all = state.routes.list();
    all.sort_by_key(|route| route.created_at);
    Json(all)
}

#[derive(Serialize)]
struct RouteView {
    #[serde(flatten)]
    route: DeliveryRoute,
    efficiency: f64,
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteView>, AppError> {
    let route = state.routes.get(id)?;
    let efficiency = route.efficiency();
    Ok(Json(RouteView { route, efficiency }))
}

#[derive(Deserialize)]
pub struct PlanningRequest {
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub distance_km: f64,
    pub order_count: u32,
}

async fn set_planning(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PlanningRequest>,
) -> Result<Json<DeliveryRoute>, AppError> {
    let route = routes::set_planning(
        &state,
        id,
        payload.planned_start,
        payload.planned_end,
        payload.distance_km,
        payload.order_count,
        Utc::now(),
    )?;
    Ok(Json(route))
}

#[derive(Deserialize)]
pub struct AssignOrdersRequest {
    pub delivery_ids: Vec<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

async fn assign_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignOrdersRequest>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let ctx = ActionContext {
        triggered_by: "route_planner",
        triggered_event: "route.orders_assigned",
        user: payload.user_id,
    };
    let assigned = routes::assign_orders(&state, id, &payload.delivery_ids, ctx, Utc::now())?;
    Ok(Json(assigned))
}

async fn start_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRoute>, AppError> {
    Ok(Json(routes::start_route(&state, id, Utc::now())?))
}

#[derive(Deserialize)]
pub struct CompleteRouteRequest {
    pub actual_distance_km: f64,
    pub actual_delivered: u32,
}

async fn complete_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRouteRequest>,
) -> Result<Json<RouteView>, AppError> {
    let route = routes::complete_route(
        &state,
        id,
        payload.actual_distance_km,
        payload.actual_delivered,
        Utc::now(),
    )?;
    let efficiency = route.efficiency();
    Ok(Json(RouteView { route, efficiency }))
}

async fn cancel_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRoute>, AppError> {
    Ok(Json(routes::cancel_route(&state, id, Utc::now())?))
}
