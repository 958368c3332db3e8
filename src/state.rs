use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::broadcast::DispatchJob;
use crate::engine::tracker::ProviderTrack;
use crate::models::provider::ProviderSnapshot;
use crate::models::request::ServiceRequest;
use crate::notify::{BroadcastSink, DispatchNotification, NotificationSink};
use crate::observability::metrics::Metrics;
use crate::routing::RoutingProvider;

pub struct AppState {
    pub config: Config,
    pub requests: DashMap<Uuid, ServiceRequest>,
    pub providers: DashMap<Uuid, ProviderSnapshot>,
    pub tracks: DashMap<Uuid, ProviderTrack>,
    pub dispatch_tx: mpsc::Sender<DispatchJob>,
    pub events_tx: broadcast::Sender<DispatchNotification>,
    pub notifier: Arc<dyn NotificationSink>,
    pub routing: Option<Arc<dyn RoutingProvider>>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> (Self, mpsc::Receiver<DispatchJob>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_queue_size);
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let notifier: Arc<dyn NotificationSink> =
            Arc::new(BroadcastSink::new(events_tx.clone()));

        (
            Self {
                config,
                requests: DashMap::new(),
                providers: DashMap::new(),
                tracks: DashMap::new(),
                dispatch_tx,
                events_tx,
                notifier,
                routing: None,
                metrics: Metrics::new(),
            },
            dispatch_rx,
        )
    }

    /// The candidate pool as seen by the locator: a point-in-time snapshot of
    /// every provider, eligibility flags included.
    pub fn provider_pool(&self) -> Vec<ProviderSnapshot> {
        self.providers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
