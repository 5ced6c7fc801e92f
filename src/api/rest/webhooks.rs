use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{self, CarrierUpdate};
use crate::error::AppError;
use crate::models::order::{DeliveryOrder, DeliveryStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/carrier", post(carrier_webhook))
}

#[derive(Deserialize)]
pub struct CarrierWebhookPayload {
    pub provider_code: String,
    pub external_reference: String,
    #[serde(default)]
    pub delivery_id: Option<Uuid>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
}

/// Carrier tracking ingestion. Replays of the same reference and
/// status answer 200 without touching the order.
async fn carrier_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CarrierWebhookPayload>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let update = CarrierUpdate {
        provider_code: payload.provider_code,
        external_reference: payload.external_reference,
        delivery_id: payload.delivery_id,
        tracking_number: payload.tracking_number,
        status: payload.status,
    };
    let order = lifecycle::apply_carrier_update(&state, update, Utc::now())?;
    Ok(Json(order))
}
