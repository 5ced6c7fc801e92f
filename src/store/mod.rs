use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::DeliveryOrder;
use crate::models::route::DeliveryRoute;
use crate::models::snapshot::{DeliverySnapshot, SnapshotEvent};
use crate::models::task::ManualCoordinationTask;
use crate::models::vehicle::DeliveryVehicle;

pub trait Versioned {
    fn version(&self) -> u64;
    fn bump_version(&mut self);
}

macro_rules! versioned {
    ($ty:ty) => {
        impl Versioned for $ty {
            fn version(&self) -> u64 {
                self.version
            }
            fn bump_version(&mut self) {
                self.version += 1;
            }
        }
    };
}

versioned!(DeliveryOrder);
versioned!(ManualCoordinationTask);
versioned!(DeliveryRoute);
versioned!(DeliveryVehicle);

/// Whether an update closure actually changed the row. Idempotent
/// replays report `Unchanged` so the version counter stays put.
pub enum Mutation<R> {
    Changed(R),
    Unchanged(R),
}

/// In-memory stand-in for the persistence collaborator. Mutations run
/// while holding the row's map entry, which serializes concurrent
/// writers per row; `expected_version` adds compare-and-swap semantics
/// on top for callers racing a webhook.
pub struct VersionedStore<T> {
    entity: &'static str,
    items: DashMap<Uuid, T>,
}

impl<T: Clone + Versioned> VersionedStore<T> {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            items: DashMap::new(),
        }
    }

    pub fn insert(&self, id: Uuid, value: T) {
        self.items.insert(id, value);
    }

    pub fn get(&self, id: Uuid) -> Result<T, AppError> {
        self.items
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound {
                entity: self.entity,
                id: id.to_string(),
            })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.contains_key(&id)
    }

    pub fn list(&self) -> Vec<T> {
        self.items.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn update<R>(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        f: impl FnOnce(&mut T) -> Result<Mutation<R>, AppError>,
    ) -> Result<R, AppError> {
        let mut entry = self.items.get_mut(&id).ok_or_else(|| AppError::NotFound {
            entity: self.entity,
            id: id.to_string(),
        })?;

        if let Some(expected) = expected_version {
            if entry.version() != expected {
                return Err(AppError::VersionConflict {
                    entity: self.entity,
                    id,
                });
            }
        }

        match f(entry.value_mut())? {
            Mutation::Changed(result) => {
                entry.bump_version();
                Ok(result)
            }
            Mutation::Unchanged(result) => Ok(result),
        }
    }
}

/// Append-only audit log, one chained timeline per delivery. Snapshots
/// are never updated or deleted; the only bulk operation is retention
/// pruning by age.
pub struct SnapshotStore {
    timelines: DashMap<Uuid, Vec<DeliverySnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            timelines: DashMap::new(),
        }
    }

    /// Captures the order's full state and chains to the timeline's
    /// latest snapshot. Returns the new snapshot id.
    pub fn record(
        &self,
        order: &DeliveryOrder,
        event: SnapshotEvent,
        triggered_by: &str,
        triggered_event: &str,
        triggered_by_user: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let mut timeline = self.timelines.entry(order.id).or_default();
        let previous_snapshot_id = timeline.last().map(|snapshot| snapshot.id);

        let snapshot = DeliverySnapshot {
            id: Uuid::new_v4(),
            delivery_id: order.id,
            event,
            order: order.clone(),
            previous_snapshot_id,
            triggered_by: triggered_by.to_string(),
            triggered_event: triggered_event.to_string(),
            triggered_by_user,
            status: order.status,
            customer_id: order.customer_id,
            order_id: order.order_id,
            vehicle_id: order.vehicle_id,
            province: order.address.province.clone(),
            delivery_fee: order.delivery_fee,
            provider_code: order.provider_code.clone(),
            recorded_at: now,
        };

        let id = snapshot.id;
        timeline.push(snapshot);
        id
    }

    /// The authoritative audit trail, in creation order.
    pub fn timeline(&self, delivery_id: Uuid) -> Vec<DeliverySnapshot> {
        self.timelines
            .get(&delivery_id)
            .map(|timeline| timeline.clone())
            .unwrap_or_default()
    }

    pub fn latest(&self, delivery_id: Uuid) -> Option<DeliverySnapshot> {
        self.timelines
            .get(&delivery_id)
            .and_then(|timeline| timeline.last().cloned())
    }

    pub fn total(&self) -> usize {
        self.timelines.iter().map(|entry| entry.value().len()).sum()
    }

    /// Retention: drops snapshots recorded before the cutoff. Returns
    /// how many were pruned.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut pruned = 0;
        for mut entry in self.timelines.iter_mut() {
            let timeline = entry.value_mut();
            let before = timeline.len();
            timeline.retain(|snapshot| snapshot.recorded_at >= cutoff);
            pruned += before - timeline.len();
        }
        pruned
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
