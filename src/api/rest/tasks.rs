use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::events::{publish, DeliveryEvent, EventKind};
use crate::models::task::{ManualCoordinationTask, TaskStatus};
use crate::state::AppState;
use crate::store::Mutation;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/overdue", get(list_overdue))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/assign", post(assign_task))
        .route("/tasks/:id/complete", post(complete_task))
        .route("/tasks/:id/fail", post(fail_task))
        .route("/tasks/:id/cancel", post(cancel_task))
}

#[derive(Deserialize, Default)]
pub struct TaskListQuery {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub delivery_id: Option<Uuid>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskListQuery>,
) -> Json<Vec<ManualCoordinationTask>> {
    let mut tasks: Vec<ManualCoordinationTask> = state
        .tasks
        .list()
        .into_iter()
        .filter(|task| query.status.is_none_or(|status| task.status == status))
        .filter(|task| {
            query
                .delivery_id
                .is_none_or(|delivery_id| task.delivery_id == delivery_id)
        })
        .collect();
    tasks.sort_by_key(|task| task.created_at);
    Json(tasks)
}

/// The SLA dashboard feed: active tasks past their type's threshold.
async fn list_overdue(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ManualCoordinationTask>> {
    let now = Utc::now();
    let mut tasks: Vec<ManualCoordinationTask> = state
        .tasks
        .list()
        .into_iter()
        .filter(|task| task.is_overdue(&state.escalation, now))
        .collect();
    tasks.sort_by_key(|task| task.created_at);
    Json(tasks)
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ManualCoordinationTask>, AppError> {
    Ok(Json(state.tasks.get(id)?))
}

#[derive(Deserialize)]
pub struct AssignTaskRequest {
    pub user_id: Uuid,
}

async fn assign_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignTaskRequest>,
) -> Result<Json<ManualCoordinationTask>, AppError> {
    let now = Utc::now();
    let task = state.tasks.update(id, None, |task| {
        task.assign_to(payload.user_id, now)?;
        Ok(Mutation::Changed(task.clone()))
    })?;
    Ok(Json(task))
}

#[derive(Deserialize)]
pub struct CompleteTaskRequest {
    pub notes: String,
    #[serde(default)]
    pub external_reference: Option<String>,
}

async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteTaskRequest>,
) -> Result<Json<ManualCoordinationTask>, AppError> {
    let now = Utc::now();
    let task = state.tasks.update(id, None, |task| {
        task.complete(&payload.notes, payload.external_reference.clone(), now)?;
        Ok(Mutation::Changed(task.clone()))
    })?;

    state.metrics.tasks_open.dec();
    publish(
        &state.events_tx,
        DeliveryEvent::new(task.delivery_id, EventKind::TaskCompleted, now)
            .with_detail(task.task_type.to_string()),
    );
    Ok(Json(task))
}

#[derive(Deserialize)]
pub struct TaskReasonRequest {
    pub reason: String,
}

async fn fail_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskReasonRequest>,
) -> Result<Json<ManualCoordinationTask>, AppError> {
    let now = Utc::now();
    let task = state.tasks.update(id, None, |task| {
        task.fail(payload.reason.clone(), now)?;
        Ok(Mutation::Changed(task.clone()))
    })?;
    state.metrics.tasks_open.dec();
    Ok(Json(task))
}

async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskReasonRequest>,
) -> Result<Json<ManualCoordinationTask>, AppError> {
    let now = Utc::now();
    let task = state.tasks.update(id, None, |task| {
        task.cancel(payload.reason.clone(), now)?;
        Ok(Mutation::Changed(task.clone()))
    })?;
    state.metrics.tasks_open.dec();
    Ok(Json(task))
}
