use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub reminders_sent_total: IntCounterVec,
    pub tasks_open: IntGauge,
    pub tasks_overdue: IntGauge,
    pub snapshots_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Delivery orders created, by method"),
            &["method"],
        )
        .expect("valid deliveries_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Applied delivery status transitions, by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of the delivery method decision in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let reminders_sent_total = IntCounterVec::new(
            Opts::new(
                "reminders_sent_total",
                "Coordination reminders sent, by task type",
            ),
            &["task_type"],
        )
        .expect("valid reminders_sent_total metric");

        let tasks_open = IntGauge::new(
            "tasks_open",
            "Manual coordination tasks currently pending or in progress",
        )
        .expect("valid tasks_open metric");

        let tasks_overdue = IntGauge::new(
            "tasks_overdue",
            "Manual coordination tasks past their SLA threshold",
        )
        .expect("valid tasks_overdue metric");

        let snapshots_total =
            IntCounter::new("snapshots_total", "Audit snapshots recorded")
                .expect("valid snapshots_total metric");

        registry
            .register(Box::new(deliveries_total.clone()))
            .expect("register deliveries_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(reminders_sent_total.clone()))
            .expect("register reminders_sent_total");
        registry
            .register(Box::new(tasks_open.clone()))
            .expect("register tasks_open");
        registry
            .register(Box::new(tasks_overdue.clone()))
            .expect("register tasks_overdue");
        registry
            .register(Box::new(snapshots_total.clone()))
            .expect("register snapshots_total");

        Self {
            registry,
            deliveries_total,
            status_transitions_total,
            dispatch_latency_seconds,
            reminders_sent_total,
            tasks_open,
            tasks_overdue,
            snapshots_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
