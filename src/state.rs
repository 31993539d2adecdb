use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::bus::TopicExchange;
use crate::config::Config;
use crate::engine::consumers::ConsumerRegistry;
use crate::notify::drivers::{DriverLocator, DriverRegistry};
use crate::notify::{BroadcastSink, Notification, NotificationSink};
use crate::observability::metrics::Metrics;
use crate::store::cache::CacheLayer;
use crate::store::BookingStore;

const EXCHANGE_NAME: &str = "booking_events";

/// Process-lifetime context. Constructed once at startup and passed by
/// handle to every component; shutdown goes through `consumers.stop_all`.
pub struct AppState {
    pub config: Config,
    pub store: BookingStore,
    pub cache: CacheLayer,
    pub bus: TopicExchange,
    pub drivers: Arc<DriverRegistry>,
    pub locator: Arc<dyn DriverLocator>,
    pub sink: Arc<dyn NotificationSink>,
    pub notifications_tx: broadcast::Sender<Notification>,
    pub consumers: ConsumerRegistry,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (notifications_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let sink: Arc<dyn NotificationSink> =
            Arc::new(BroadcastSink::new(notifications_tx.clone()));
        Self::assemble(config, sink, notifications_tx)
    }

    /// Same wiring with a caller-provided sink; the websocket surface still
    /// gets its own broadcast channel.
    pub fn with_sink(config: Config, sink: Arc<dyn NotificationSink>) -> Self {
        let (notifications_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        Self::assemble(config, sink, notifications_tx)
    }

    fn assemble(
        config: Config,
        sink: Arc<dyn NotificationSink>,
        notifications_tx: broadcast::Sender<Notification>,
    ) -> Self {
        let drivers = Arc::new(DriverRegistry::new());
        let cache = CacheLayer::new(Duration::from_secs(config.cache_ttl_secs));

        Self {
            store: BookingStore::new(),
            cache,
            bus: TopicExchange::new(EXCHANGE_NAME),
            locator: drivers.clone(),
            drivers,
            sink,
            notifications_tx,
            consumers: ConsumerRegistry::new(),
            metrics: Metrics::new(),
            config,
        }
    }
}
