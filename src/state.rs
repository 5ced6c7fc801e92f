use tokio::sync::broadcast;

use crate::engine::coverage::CoverageResolver;
use crate::engine::registry::ProviderRegistry;
use crate::error::AppError;
use crate::events::DeliveryEvent;
use crate::models::coverage::CoverageArea;
use crate::models::order::DeliveryOrder;
use crate::models::provider::DeliveryProvider;
use crate::models::route::DeliveryRoute;
use crate::models::task::{EscalationPolicy, ManualCoordinationTask};
use crate::models::vehicle::DeliveryVehicle;
use crate::observability::metrics::Metrics;
use crate::store::{SnapshotStore, VersionedStore};

pub struct AppState {
    pub deliveries: VersionedStore<DeliveryOrder>,
    pub tasks: VersionedStore<ManualCoordinationTask>,
    pub routes: VersionedStore<DeliveryRoute>,
    pub vehicles: VersionedStore<DeliveryVehicle>,
    pub snapshots: SnapshotStore,
    pub providers: ProviderRegistry,
    pub coverage: CoverageResolver,
    pub escalation: EscalationPolicy,
    pub events_tx: broadcast::Sender<DeliveryEvent>,
    pub metrics: Metrics,
}

impl AppState {
    /// Seed data is validated on the way in; a misconfigured provider
    /// or coverage area stops the service at startup rather than
    /// surfacing at dispatch time.
    pub fn new(
        providers: Vec<DeliveryProvider>,
        areas: Vec<CoverageArea>,
        event_buffer_size: usize,
    ) -> Result<Self, AppError> {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Ok(Self {
            deliveries: VersionedStore::new("delivery"),
            tasks: VersionedStore::new("task"),
            routes: VersionedStore::new("route"),
            vehicles: VersionedStore::new("vehicle"),
            snapshots: SnapshotStore::new(),
            providers: ProviderRegistry::new(providers)?,
            coverage: CoverageResolver::new(areas)?,
            escalation: EscalationPolicy::default(),
            events_tx,
            metrics: Metrics::new(),
        })
    }
}
