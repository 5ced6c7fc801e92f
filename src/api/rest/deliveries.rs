use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{self, ActionContext, NewDelivery};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::order::{DeliveryAddress, DeliveryOrder, DeliveryStatus};
use crate::models::snapshot::{self, DeliverySnapshot, SnapshotDiff};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/timeline", get(get_timeline))
        .route("/deliveries/:id/changes", get(get_changes))
        .route("/deliveries/:id/assign-vehicle", post(assign_vehicle))
        .route("/deliveries/:id/assign-provider", post(assign_provider))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/deliveries/:id/cancel", post(cancel_delivery))
}

#[derive(Deserialize)]
pub struct AddressPayload {
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

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub address: AddressPayload,
    #[serde(default)]
    pub pickup: Option<GeoPoint>,
    pub weight_kg: f64,
    #[serde(default)]
    pub cod_amount: f64,
    #[serde(default)]
    pub order_value: f64,
    #[serde(default)]
    pub same_day: bool,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub planned_delivery_time: Option<DateTime<Utc>>,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let req = NewDelivery {
        order_id: payload.order_id,
        customer_id: payload.customer_id,
        address_id: payload.address_id,
        address: DeliveryAddress {
            province: payload.address.province,
            district: payload.address.district,
            subdistrict: payload.address.subdistrict,
            postal_code: payload.address.postal_code,
            coordinates: payload.address.coordinates,
        },
        pickup: payload.pickup,
        weight_kg: payload.weight_kg,
        cod_amount: payload.cod_amount,
        order_value: payload.order_value,
        same_day: payload.same_day,
        distance_km: payload.distance_km,
        scheduled_pickup_time: payload.scheduled_pickup_time,
        planned_delivery_time: payload.planned_delivery_time,
    };

    let ctx = ActionContext {
        triggered_by: "order_service",
        triggered_event: "order.fulfillment_requested",
        user: None,
    };

    let (order, _task) = lifecycle::create_delivery(&state, req, ctx, Utc::now())?;
    Ok(Json(order))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(state.deliveries.get(id)?))
}

async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliverySnapshot>>, AppError> {
    Ok(Json(lifecycle::timeline(&state, id)?))
}

/// Change-sets between consecutive snapshots, oldest first.
async fn get_changes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SnapshotDiff>>, AppError> {
    let timeline = lifecycle::timeline(&state, id)?;
    let diffs = timeline
        .windows(2)
        .map(|pair| snapshot::compare(&pair[1], &pair[0]))
        .collect();
    Ok(Json(diffs))
}

#[derive(Deserialize)]
pub struct AssignVehicleRequest {
    pub vehicle_id: Uuid,
    #[serde(default)]
    pub route_id: Option<Uuid>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

async fn assign_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignVehicleRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let ctx = ActionContext {
        triggered_by: "operator",
        triggered_event: "delivery.vehicle_assigned",
        user: payload.user_id,
    };
    let order = lifecycle::assign_vehicle(
        &state,
        id,
        payload.vehicle_id,
        payload.route_id,
        payload.expected_version,
        ctx,
        Utc::now(),
    )?;
    Ok(Json(order))
}

#[derive(Deserialize)]
pub struct AssignProviderRequest {
    pub provider_code: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

async fn assign_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignProviderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let ctx = ActionContext {
        triggered_by: "operator",
        triggered_event: "delivery.provider_assigned",
        user: payload.user_id,
    };
    let order = lifecycle::assign_provider(
        &state,
        id,
        &payload.provider_code,
        payload.expected_version,
        ctx,
        Utc::now(),
    )?;
    Ok(Json(order))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let ctx = ActionContext {
        triggered_by: "operator",
        triggered_event: "delivery.status_updated",
        user: payload.user_id,
    };
    let (order, _outcome) = lifecycle::update_status(
        &state,
        id,
        payload.status,
        payload.reason,
        payload.expected_version,
        ctx,
        Utc::now(),
    )?;
    Ok(Json(order))
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let ctx = ActionContext {
        triggered_by: "operator",
        triggered_event: "delivery.cancelled",
        user: payload.user_id,
    };
    let order = lifecycle::cancel_delivery(
        &state,
        id,
        payload.reason,
        payload.expected_version,
        ctx,
        Utc::now(),
    )?;
    Ok(Json(order))
}
