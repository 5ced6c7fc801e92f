use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::order::DeliveryAddress;
use crate::models::provider::DeliveryProvider;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", post(register_provider).get(list_providers))
        .route("/providers/:code", get(get_provider))
        .route("/providers/:code/deactivate", post(deactivate_provider))
        .route("/coverage/:province", get(coverage_info))
}

async fn register_provider(
    State(state): State<Arc<AppState>>,
    Json(provider): Json<DeliveryProvider>,
) -> Result<Json<DeliveryProvider>, AppError> {
    state.providers.register(provider.clone())?;
    Ok(Json(provider))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryProvider>> {
    Json(state.providers.list())
}

async fn get_provider(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<DeliveryProvider>, AppError> {
    Ok(Json(state.providers.get(&code)?))
}

async fn deactivate_provider(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<DeliveryProvider>, AppError> {
    Ok(Json(state.providers.deactivate(&code)?))
}

#[derive(Serialize)]
struct CoverageInfo {
    province: String,
    covered: bool,
    self_delivery: bool,
    route_code: Option<String>,
    base_fee: Option<f64>,
}

/// Province-level coverage lookup. An uncovered province is a normal
/// answer here, not an error: the caller falls back to third-party
/// dispatch.
async fn coverage_info(
    State(state): State<Arc<AppState>>,
    Path(province): Path<String>,
) -> Json<CoverageInfo> {
    let address = DeliveryAddress {
        province: province.clone(),
        district: None,
        subdistrict: None,
        postal_code: None,
        coordinates: None,
    };

    let info = match state.coverage.resolve(&address) {
        Some(area) => CoverageInfo {
            province,
            covered: true,
            self_delivery: area.self_delivery,
            route_code: area.route_code.clone(),
            base_fee: Some(area.base_fee),
        },
        None => CoverageInfo {
            province,
            covered: false,
            self_delivery: false,
            route_code: None,
            base_fee: None,
        },
    };
    Json(info)
}
