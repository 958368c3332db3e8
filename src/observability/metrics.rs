use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub broadcasts_total: IntCounterVec,
    pub providers_notified_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub dispatch_jobs_in_queue: IntGauge,
    pub location_updates_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let broadcasts_total = IntCounterVec::new(
            Opts::new("broadcasts_total", "Dispatch broadcasts by outcome"),
            &["outcome"],
        )
        .expect("valid broadcasts_total metric");

        let providers_notified_total = IntCounterVec::new(
            Opts::new(
                "providers_notified_total",
                "Providers added to notified sets, by service kind",
            ),
            &["kind"],
        )
        .expect("valid providers_notified_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of broadcast processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let dispatch_jobs_in_queue = IntGauge::new(
            "dispatch_jobs_in_queue",
            "Current number of queued broadcast jobs",
        )
        .expect("valid dispatch_jobs_in_queue metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new("location_updates_total", "Location updates by outcome"),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");
        registry
            .register(Box::new(providers_notified_total.clone()))
            .expect("register providers_notified_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(dispatch_jobs_in_queue.clone()))
            .expect("register dispatch_jobs_in_queue");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            broadcasts_total,
            providers_notified_total,
            assignments_total,
            assignment_latency_seconds,
            dispatch_jobs_in_queue,
            location_updates_total,
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
