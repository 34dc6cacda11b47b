use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub accept_attempts_total: IntCounterVec,
    pub simulation_ticks_total: IntCounter,
    pub simulation_tick_seconds: Histogram,
    pub simulation_failures_total: IntCounter,
    pub deliveries_in_progress: IntGauge,
    pub lock_registry_entries: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "delivery_transitions_total",
                "Delivery status transitions by target status",
            ),
            &["to"],
        )
        .expect("valid delivery_transitions_total metric");

        let accept_attempts_total = IntCounterVec::new(
            Opts::new("accept_attempts_total", "Accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accept_attempts_total metric");

        let simulation_ticks_total =
            IntCounter::new("simulation_ticks_total", "Completed simulation ticks")
                .expect("valid simulation_ticks_total metric");

        let simulation_tick_seconds = Histogram::with_opts(HistogramOpts::new(
            "simulation_tick_seconds",
            "Duration of one simulation tick in seconds",
        ))
        .expect("valid simulation_tick_seconds metric");

        let simulation_failures_total = IntCounter::new(
            "simulation_failures_total",
            "Deliveries that failed to advance during a tick",
        )
        .expect("valid simulation_failures_total metric");

        let deliveries_in_progress = IntGauge::new(
            "deliveries_in_progress",
            "In-progress deliveries seen by the last tick",
        )
        .expect("valid deliveries_in_progress metric");

        let lock_registry_entries = IntGauge::new(
            "lock_registry_entries",
            "Live per-delivery lock entries",
        )
        .expect("valid lock_registry_entries metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register delivery_transitions_total");
        registry
            .register(Box::new(accept_attempts_total.clone()))
            .expect("register accept_attempts_total");
        registry
            .register(Box::new(simulation_ticks_total.clone()))
            .expect("register simulation_ticks_total");
        registry
            .register(Box::new(simulation_tick_seconds.clone()))
            .expect("register simulation_tick_seconds");
        registry
            .register(Box::new(simulation_failures_total.clone()))
            .expect("register simulation_failures_total");
        registry
            .register(Box::new(deliveries_in_progress.clone()))
            .expect("register deliveries_in_progress");
        registry
            .register(Box::new(lock_registry_entries.clone()))
            .expect("register lock_registry_entries");

        Self {
            registry,
            transitions_total,
            accept_attempts_total,
            simulation_ticks_total,
            simulation_tick_seconds,
            simulation_failures_total,
            deliveries_in_progress,
            lock_registry_entries,
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
