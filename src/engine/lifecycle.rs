use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::dispatch::{self, Shipment};
use crate::error::AppError;
use crate::events::{publish, DeliveryEvent, EventKind};
use crate::geo::{haversine_km, GeoPoint};
use crate::models::order::{
    DeliveryAddress, DeliveryOrder, DeliveryStatus, TransitionOutcome,
};
use crate::models::snapshot::SnapshotEvent;
use crate::models::task::ManualCoordinationTask;
use crate::state::AppState;
use crate::store::Mutation;

/// Who pushed the state machine, threaded into every snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub triggered_by: &'a str,
    pub triggered_event: &'a str,
    pub user: Option<Uuid>,
}

pub struct NewDelivery {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub address: DeliveryAddress,
    pub pickup: Option<GeoPoint>,
    pub weight_kg: f64,
    pub cod_amount: f64,
    pub order_value: f64,
    pub same_day: bool,
    pub distance_km: Option<f64>,
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    pub planned_delivery_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CarrierUpdate {
    pub provider_code: String,
    pub external_reference: String,
    pub delivery_id: Option<Uuid>,
    pub tracking_number: Option<String>,
    pub status: Option<DeliveryStatus>,
}

fn record_snapshot(
    state: &AppState,
    order: &DeliveryOrder,
    event: SnapshotEvent,
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Uuid {
    state.metrics.snapshots_total.inc();
    state.snapshots.record(
        order,
        event,
        ctx.triggered_by,
        ctx.triggered_event,
        ctx.user,
        now,
    )
}

fn validate_new(req: &NewDelivery) -> Result<(), AppError> {
    if req.address.province.trim().is_empty() {
        return Err(AppError::Validation {
            field: "province",
            message: "destination province is required".to_string(),
        });
    }
    if req.weight_kg <= 0.0 {
        return Err(AppError::Validation {
            field: "weight_kg",
            message: "weight must be positive".to_string(),
        });
    }
    if req.cod_amount < 0.0 {
        return Err(AppError::Validation {
            field: "cod_amount",
            message: "cod amount must be non-negative".to_string(),
        });
    }
    if req.order_value < 0.0 {
        return Err(AppError::Validation {
            field: "order_value",
            message: "order value must be non-negative".to_string(),
        });
    }
    if req.distance_km.is_some_and(|d| d < 0.0) {
        return Err(AppError::Validation {
            field: "distance_km",
            message: "distance must be non-negative".to_string(),
        });
    }
    Ok(())
}

/// Distance comes from the caller when a routing service already
/// computed it; otherwise derived from coordinates when both ends are
/// known.
fn resolve_distance(req: &NewDelivery) -> f64 {
    if let Some(distance) = req.distance_km {
        return distance;
    }
    match (&req.pickup, &req.address.coordinates) {
        (Some(origin), Some(destination)) => haversine_km(origin, destination),
        _ => 0.0,
    }
}

/// Creates a delivery order and drives the method decision. A
/// manual-coordination winner opens exactly one pending task alongside
/// the order.
pub fn create_delivery(
    state: &AppState,
    req: NewDelivery,
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Result<(DeliveryOrder, Option<ManualCoordinationTask>), AppError> {
    validate_new(&req)?;
    let distance_km = resolve_distance(&req);

    let shipment = Shipment {
        distance_km,
        weight_kg: req.weight_kg,
        order_value: req.order_value,
        same_day: req.same_day,
        cod: req.cod_amount > 0.0,
    };

    let start = Instant::now();
    let decision = dispatch::decide(
        &state.coverage,
        &state.providers,
        &req.address,
        &shipment,
        now.time(),
    );
    let outcome_label = if decision.is_ok() { "success" } else { "error" };
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[outcome_label])
        .observe(start.elapsed().as_secs_f64());
    let decision = decision?;

    let order = DeliveryOrder {
        id: Uuid::new_v4(),
        order_id: req.order_id,
        customer_id: req.customer_id,
        address_id: req.address_id,
        address: req.address,
        method: decision.method,
        provider_code: decision.provider.as_ref().map(|p| p.code.clone()),
        vehicle_id: None,
        route_id: None,
        tracking_number: None,
        provider_order_ref: None,
        scheduled_pickup_time: req.scheduled_pickup_time,
        planned_delivery_time: req.planned_delivery_time,
        estimated_delivery_time: None,
        actual_pickup_time: None,
        actual_delivery_time: None,
        weight_kg: req.weight_kg,
        distance_km,
        order_value: req.order_value,
        delivery_fee: decision.delivery_fee,
        cod_amount: req.cod_amount,
        same_day: req.same_day,
        status: DeliveryStatus::Pending,
        requires_manual_coordination: decision.requires_manual_coordination,
        active: true,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    state.deliveries.insert(order.id, order.clone());
    record_snapshot(
        state,
        &order,
        SnapshotEvent::Created {
            method: order.method,
            delivery_fee: order.delivery_fee,
        },
        ctx,
        now,
    );

    let task = if decision.requires_manual_coordination {
        let provider = decision
            .provider
            .as_ref()
            .expect("manual coordination decision always carries its provider");
        let instructions = format!(
            "Book pickup with {} for delivery to {}",
            provider.name, order.address.province
        );
        let task = ManualCoordinationTask::open(
            order.id,
            provider,
            instructions,
            &state.escalation,
            now,
        );
        state.tasks.insert(task.id, task.clone());
        state.metrics.tasks_open.inc();
        publish(
            &state.events_tx,
            DeliveryEvent::new(order.id, EventKind::TaskOpened, now)
                .with_detail(task.task_type.to_string()),
        );
        Some(task)
    } else {
        None
    };

    state
        .metrics
        .deliveries_total
        .with_label_values(&[&order.method.to_string()])
        .inc();
    publish(
        &state.events_tx,
        DeliveryEvent::new(order.id, EventKind::Created, now)
            .with_detail(order.method.to_string()),
    );

    info!(
        delivery_id = %order.id,
        method = %order.method,
        fee = order.delivery_fee,
        manual = order.requires_manual_coordination,
        "delivery order created"
    );

    Ok((order, task))
}

pub fn assign_vehicle(
    state: &AppState,
    delivery_id: Uuid,
    vehicle_id: Uuid,
    route_id: Option<Uuid>,
    expected_version: Option<u64>,
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Result<DeliveryOrder, AppError> {
    // The vehicle must exist before it can carry anything.
    state.vehicles.get(vehicle_id)?;

    let order = state
        .deliveries
        .update(delivery_id, expected_version, |order| {
            order.assign_vehicle(vehicle_id, route_id, now)?;
            if order.status == DeliveryStatus::Pending {
                order.transition(DeliveryStatus::Planned, now)?;
            }
            record_snapshot(
                state,
                order,
                SnapshotEvent::Assigned {
                    vehicle_id,
                    route_id,
                },
                ctx,
                now,
            );
            Ok(Mutation::Changed(order.clone()))
        })?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["planned"])
        .inc();
    publish(
        &state.events_tx,
        DeliveryEvent::new(delivery_id, EventKind::VehicleAssigned, now),
    );

    Ok(order)
}

pub fn assign_provider(
    state: &AppState,
    delivery_id: Uuid,
    provider_code: &str,
    expected_version: Option<u64>,
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Result<DeliveryOrder, AppError> {
    let provider = state.providers.get(provider_code)?;
    if !provider.active {
        return Err(AppError::Validation {
            field: "provider_code",
            message: format!("provider {} is deactivated", provider.code),
        });
    }

    let order = state
        .deliveries
        .update(delivery_id, expected_version, |order| {
            order.assign_provider(&provider.code, now)?;
            record_snapshot(
                state,
                order,
                SnapshotEvent::ProviderUpdated {
                    provider_code: provider.code.clone(),
                },
                ctx,
                now,
            );
            Ok(Mutation::Changed(order.clone()))
        })?;

    publish(
        &state.events_tx,
        DeliveryEvent::new(delivery_id, EventKind::ProviderAssigned, now)
            .with_detail(provider.code.clone()),
    );

    Ok(order)
}

fn event_kind_for(status: DeliveryStatus) -> EventKind {
    match status {
        DeliveryStatus::Delivered => EventKind::Delivered,
        DeliveryStatus::Failed => EventKind::Failed,
        DeliveryStatus::Cancelled => EventKind::Cancelled,
        _ => EventKind::StatusChanged,
    }
}

/// Single entry point for every status change, webhook- or
/// operator-driven. The snapshot write shares the row's critical
/// section with the mutation, so the audit trail cannot diverge.
pub fn update_status(
    state: &AppState,
    delivery_id: Uuid,
    next: DeliveryStatus,
    reason: Option<String>,
    expected_version: Option<u64>,
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Result<(DeliveryOrder, TransitionOutcome), AppError> {
    let (order, outcome) = state
        .deliveries
        .update(delivery_id, expected_version, |order| {
            let from = order.status;
            match order.transition(next, now)? {
                TransitionOutcome::Applied => {
                    record_snapshot(
                        state,
                        order,
                        SnapshotEvent::for_transition(from, next, reason.clone()),
                        ctx,
                        now,
                    );
                    Ok(Mutation::Changed((order.clone(), TransitionOutcome::Applied)))
                }
                TransitionOutcome::NoOp => {
                    Ok(Mutation::Unchanged((order.clone(), TransitionOutcome::NoOp)))
                }
            }
        })?;

    if outcome == TransitionOutcome::Applied {
        state
            .metrics
            .status_transitions_total
            .with_label_values(&[&next.to_string()])
            .inc();
        publish(
            &state.events_tx,
            DeliveryEvent::new(delivery_id, event_kind_for(next), now)
                .with_detail(next.to_string()),
        );
    }

    Ok((order, outcome))
}

/// Operator cancellation. Narrower than the raw transition table: once
/// the shipment moves, cancellation goes through the carrier, not us.
pub fn cancel_delivery(
    state: &AppState,
    delivery_id: Uuid,
    reason: Option<String>,
    expected_version: Option<u64>,
    ctx: ActionContext<'_>,
    now: DateTime<Utc>,
) -> Result<DeliveryOrder, AppError> {
    let order = state
        .deliveries
        .update(delivery_id, expected_version, |order| {
            if !order.can_cancel() {
                return Err(AppError::InvalidDeliveryState {
                    delivery_id: order.id,
                    status: order.status,
                    action: "cancel",
                });
            }
            order.transition(DeliveryStatus::Cancelled, now)?;
            record_snapshot(
                state,
                order,
                SnapshotEvent::Cancelled {
                    reason: reason.clone(),
                },
                ctx,
                now,
            );
            Ok(Mutation::Changed(order.clone()))
        })?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["cancelled"])
        .inc();
    publish(
        &state.events_tx,
        DeliveryEvent::new(delivery_id, EventKind::Cancelled, now),
    );

    Ok(order)
}

/// Carrier webhook ingestion. Idempotent per external reference: a
/// replayed status or tracking number changes nothing and reports 200.
pub fn apply_carrier_update(
    state: &AppState,
    update: CarrierUpdate,
    now: DateTime<Utc>,
) -> Result<DeliveryOrder, AppError> {
    let delivery_id = match update.delivery_id {
        Some(id) => id,
        None => state
            .deliveries
            .list()
            .into_iter()
            .find(|order| {
                order.provider_code.as_deref() == Some(update.provider_code.as_str())
                    && (order.provider_order_ref.as_deref()
                        == Some(update.external_reference.as_str())
                        || order.tracking_number.as_deref()
                            == Some(update.external_reference.as_str()))
            })
            .map(|order| order.id)
            .ok_or_else(|| AppError::NotFound {
                entity: "delivery",
                id: update.external_reference.clone(),
            })?,
    };

    let ctx = ActionContext {
        triggered_by: "carrier_webhook",
        triggered_event: "carrier.tracking_update",
        user: None,
    };

    let (order, status_applied) =
        state
            .deliveries
            .update(delivery_id, None, |order| {
                let tracking_changed = order.set_tracking(
                    update.tracking_number.clone(),
                    Some(update.external_reference.clone()),
                    now,
                );

                let mut transition_applied = false;
                if let Some(next) = update.status {
                    let from = order.status;
                    if order.transition(next, now)? == TransitionOutcome::Applied {
                        record_snapshot(
                            state,
                            order,
                            SnapshotEvent::for_transition(from, next, None),
                            ctx,
                            now,
                        );
                        transition_applied = true;
                    }
                }

                if tracking_changed && !transition_applied {
                    record_snapshot(
                        state,
                        order,
                        SnapshotEvent::ProviderUpdated {
                            provider_code: update.provider_code.clone(),
                        },
                        ctx,
                        now,
                    );
                }

                if tracking_changed || transition_applied {
                    Ok(Mutation::Changed((order.clone(), transition_applied)))
                } else {
                    Ok(Mutation::Unchanged((order.clone(), false)))
                }
            })?;

    if status_applied {
        if let Some(next) = update.status {
            state
                .metrics
                .status_transitions_total
                .with_label_values(&[&next.to_string()])
                .inc();
            publish(
                &state.events_tx,
                DeliveryEvent::new(delivery_id, event_kind_for(next), now)
                    .with_detail(next.to_string()),
            );
        }
    }

    Ok(order)
}

pub fn timeline(
    state: &AppState,
    delivery_id: Uuid,
) -> Result<Vec<crate::models::snapshot::DeliverySnapshot>, AppError> {
    // Distinguish "unknown delivery" from "no snapshots yet".
    state.deliveries.get(delivery_id)?;
    Ok(state.snapshots.timeline(delivery_id))
}
