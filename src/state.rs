use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;

use crate::engine::simulation::{SimulationScheduler, SimulationSettings};
use crate::engine::transitions::DeliveryStateMachine;
use crate::models::event::DeliveryEvent;
use crate::notify::BroadcastSink;
use crate::observability::metrics::Metrics;
use crate::store::{DeliveryStore, InMemoryStore};

pub struct AppState {
    pub store: Arc<dyn DeliveryStore>,
    pub deliveries: DeliveryStateMachine,
    pub delivery_events_tx: broadcast::Sender<DeliveryEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(lock_timeout: Duration, event_buffer_size: usize) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), lock_timeout, event_buffer_size)
    }

    pub fn with_store(
        store: Arc<dyn DeliveryStore>,
        lock_timeout: Duration,
        event_buffer_size: usize,
    ) -> Self {
        let (delivery_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);
        let metrics = Metrics::new();

        Self {
            deliveries: DeliveryStateMachine::new(store.clone(), lock_timeout, metrics.clone()),
            store,
            delivery_events_tx,
            metrics,
        }
    }

    /// Builds a scheduler over the same store, publishing to WebSocket
    /// subscribers. A `seed` makes the movement reproducible.
    pub fn simulation(&self, settings: SimulationSettings, seed: Option<u64>) -> SimulationScheduler {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        SimulationScheduler::new(
            self.store.clone(),
            Arc::new(BroadcastSink::new(self.delivery_events_tx.clone())),
            settings,
            Box::new(rng),
            self.metrics.clone(),
        )
    }
}
