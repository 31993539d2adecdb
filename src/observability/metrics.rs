use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_created_total: IntCounter,
    pub transitions_total: IntCounterVec,
    pub events_published_total: IntCounterVec,
    pub events_consumed_total: IntCounterVec,
    pub dead_letters_total: IntCounter,
    pub notifications_total: IntCounterVec,
    pub cache_hits_total: IntCounter,
    pub cache_misses_total: IntCounter,
    pub queue_depth: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_created_total =
            IntCounter::new("bookings_created_total", "Total bookings created")
                .expect("valid bookings_created_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Status transitions by target status"),
            &["status"],
        )
        .expect("valid transitions_total metric");

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Events published by routing key"),
            &["routing_key"],
        )
        .expect("valid events_published_total metric");

        let events_consumed_total = IntCounterVec::new(
            Opts::new("events_consumed_total", "Events consumed by queue and outcome"),
            &["queue", "outcome"],
        )
        .expect("valid events_consumed_total metric");

        let dead_letters_total =
            IntCounter::new("dead_letters_total", "Messages diverted to the dead-letter queue")
                .expect("valid dead_letters_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notifications dispatched by event"),
            &["event"],
        )
        .expect("valid notifications_total metric");

        let cache_hits_total = IntCounter::new("cache_hits_total", "Booking cache hits")
            .expect("valid cache_hits_total metric");

        let cache_misses_total = IntCounter::new("cache_misses_total", "Booking cache misses")
            .expect("valid cache_misses_total metric");

        let queue_depth = IntGaugeVec::new(
            Opts::new("queue_depth", "Messages waiting per queue"),
            &["queue"],
        )
        .expect("valid queue_depth metric");

        registry
            .register(Box::new(bookings_created_total.clone()))
            .expect("register bookings_created_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");
        registry
            .register(Box::new(events_consumed_total.clone()))
            .expect("register events_consumed_total");
        registry
            .register(Box::new(dead_letters_total.clone()))
            .expect("register dead_letters_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(cache_hits_total.clone()))
            .expect("register cache_hits_total");
        registry
            .register(Box::new(cache_misses_total.clone()))
            .expect("register cache_misses_total");
        registry
            .register(Box::new(queue_depth.clone()))
            .expect("register queue_depth");

        Self {
            registry,
            bookings_created_total,
            transitions_total,
            events_published_total,
            events_consumed_total,
            dead_letters_total,
            notifications_total,
            cache_hits_total,
            cache_misses_total,
            queue_depth,
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
