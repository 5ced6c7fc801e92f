use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::DeliveryStatus;
use crate::models::route::RouteStatus;
use crate::models::task::TaskStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("delivery {delivery_id}: invalid status transition {from} -> {to}")]
    InvalidStatusTransition {
        delivery_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("delivery {delivery_id} is {status}, cannot {action}")]
    InvalidDeliveryState {
        delivery_id: Uuid,
        status: DeliveryStatus,
        action: &'static str,
    },

    #[error("task {task_id} is {status}, cannot {action}")]
    InvalidTaskState {
        task_id: Uuid,
        status: TaskStatus,
        action: &'static str,
    },

    #[error("route {route_id} is {status}, cannot {action}")]
    InvalidRouteState {
        route_id: Uuid,
        status: RouteStatus,
        action: &'static str,
    },

    #[error("vehicle {vehicle_id} already has an active route")]
    VehicleBusy { vehicle_id: Uuid },

    #[error("provider {code} misconfigured: {reason}")]
    ProviderConfig { code: String, reason: String },

    #[error("concurrent update on {entity} {id}")]
    VersionConflict { entity: &'static str, id: Uuid },

    #[error("no provider available for {province}")]
    NoProviderAvailable { province: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable discriminant so callers can branch on the
    /// violated precondition without matching message text.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "not_found",
            AppError::Validation { .. } => "validation",
            AppError::InvalidStatusTransition { .. } => "invalid_status_transition",
            AppError::InvalidDeliveryState { .. } => "invalid_delivery_state",
            AppError::InvalidTaskState { .. } => "invalid_task_state",
            AppError::InvalidRouteState { .. } => "invalid_route_state",
            AppError::VehicleBusy { .. } => "vehicle_busy",
            AppError::ProviderConfig { .. } => "provider_config",
            AppError::VersionConflict { .. } => "version_conflict",
            AppError::NoProviderAvailable { .. } => "no_provider_available",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidStatusTransition { .. }
            | AppError::InvalidDeliveryState { .. }
            | AppError::InvalidTaskState { .. }
            | AppError::InvalidRouteState { .. }
            | AppError::VehicleBusy { .. }
            | AppError::VersionConflict { .. } => StatusCode::CONFLICT,
            AppError::ProviderConfig { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoProviderAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
