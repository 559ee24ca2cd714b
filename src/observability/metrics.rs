use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub assignments_total: IntCounterVec,
    pub deliveries_total: IntCounter,
    pub delivery_duration_minutes: Histogram,
    pub location_updates_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders created")
                .expect("valid orders_created_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Agent assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let deliveries_total =
            IntCounter::new("deliveries_total", "Total completed deliveries")
                .expect("valid deliveries_total metric");

        let delivery_duration_minutes = Histogram::with_opts(
            HistogramOpts::new(
                "delivery_duration_minutes",
                "Minutes from assignment to delivery",
            )
            .buckets(vec![5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0, 90.0]),
        )
        .expect("valid delivery_duration_minutes metric");

        let location_updates_total = IntCounter::new(
            "location_updates_total",
            "Total courier location reports against orders",
        )
        .expect("valid location_updates_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(deliveries_total.clone()))
            .expect("register deliveries_total");
        registry
            .register(Box::new(delivery_duration_minutes.clone()))
            .expect("register delivery_duration_minutes");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            orders_created_total,
            assignments_total,
            deliveries_total,
            delivery_duration_minutes,
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
