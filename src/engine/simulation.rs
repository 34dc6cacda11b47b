//! Background advancement of in-progress deliveries.
//!
//! Every tick loads the in-progress set, moves each delivery one bounded
//! random step towards its destination, persists the result and notifies the
//! sink. Each step shrinks the remaining planar distance, so every delivery
//! arrives after finitely many ticks.

use std::f64::consts::FRAC_PI_6;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::{Rng, RngCore};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::geo::{has_arrived, planar_distance, DistanceMetric};
use crate::models::delivery::{Delivery, DeliveryStatus, GeoPoint};
use crate::models::event::{DeliveryEvent, EventKind};
use crate::notify::NotificationSink;
use crate::observability::metrics::Metrics;
use crate::store::DeliveryStore;

/// Largest angle between the heading of a step and the direct bearing.
pub const MAX_HEADING_DEVIATION: f64 = FRAC_PI_6;
const MIN_STEP_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct SimulationSettings {
    pub tick_interval: Duration,
    pub arrival_threshold: f64,
    pub step_size: f64,
    pub metric: DistanceMetric,
    pub notify_timeout: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            arrival_threshold: 0.1,
            step_size: 0.05,
            metric: DistanceMetric::Planar,
            notify_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Ticking,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub advanced: usize,
    pub arrived: usize,
    pub failed: usize,
}

pub struct SimulationScheduler {
    store: Arc<dyn DeliveryStore>,
    sink: Arc<dyn NotificationSink>,
    settings: SimulationSettings,
    rng: Mutex<Box<dyn RngCore + Send>>,
    state: watch::Sender<SchedulerState>,
    metrics: Metrics,
}

impl SimulationScheduler {
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        sink: Arc<dyn NotificationSink>,
        settings: SimulationSettings,
        rng: Box<dyn RngCore + Send>,
        metrics: Metrics,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);

        Self {
            store,
            sink,
            settings,
            rng: Mutex::new(rng),
            state,
            metrics,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Ticks at the configured interval until `cancel` fires. Cancellation is
    /// only observed between ticks.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            tick_ms = self.settings.tick_interval.as_millis() as u64,
            threshold = self.settings.arrival_threshold,
            metric = %self.settings.metric,
            "simulation scheduler started"
        );

        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.tick().await {
                error!(error = %err, "simulation tick failed");
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!("simulation scheduler stopped");
    }

    pub async fn tick(&self) -> Result<TickReport, AppError> {
        self.state.send_replace(SchedulerState::Ticking);
        let start = Instant::now();

        let result = self.advance_all().await;

        self.metrics
            .simulation_tick_seconds
            .observe(start.elapsed().as_secs_f64());
        self.metrics.simulation_ticks_total.inc();
        self.state.send_replace(SchedulerState::Idle);

        result
    }

    async fn advance_all(&self) -> Result<TickReport, AppError> {
        let deliveries = self
            .store
            .list_by_status(DeliveryStatus::InProgress)
            .await?;
        self.metrics
            .deliveries_in_progress
            .set(deliveries.len() as i64);

        let mut report = TickReport::default();
        for delivery in deliveries {
            let id = delivery.id;
            match self.advance(delivery).await {
                Ok(EventKind::Arrived) => report.arrived += 1,
                Ok(EventKind::Progress) => report.advanced += 1,
                Err(err) => {
                    report.failed += 1;
                    self.metrics.simulation_failures_total.inc();
                    warn!(delivery_id = %id, error = %err, "failed to advance delivery");
                }
            }
        }

        debug!(
            advanced = report.advanced,
            arrived = report.arrived,
            failed = report.failed,
            "simulation tick finished"
        );

        Ok(report)
    }

    async fn advance(&self, delivery: Delivery) -> Result<EventKind, AppError> {
        let current = delivery.current.unwrap_or(delivery.pickup);
        let next = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            next_position(
                &mut **rng,
                current,
                delivery.destination,
                self.settings.step_size,
            )
        };

        let arrived = has_arrived(
            &next,
            &delivery.destination,
            self.settings.arrival_threshold,
            self.settings.metric,
        );

        let mut updated = delivery;
        updated.current = Some(next);
        updated.updated_at = Utc::now();
        if arrived {
            updated.status = DeliveryStatus::Delivered;
        }

        self.store
            .update_if_status(DeliveryStatus::InProgress, updated.clone())
            .await?;

        let kind = if arrived {
            self.metrics
                .transitions_total
                .with_label_values(&[DeliveryStatus::Delivered.as_str()])
                .inc();
            info!(delivery_id = %updated.id, "delivery reached the destination");
            EventKind::Arrived
        } else {
            debug!(
                delivery_id = %updated.id,
                lat = next.lat,
                lng = next.lng,
                "delivery moved"
            );
            EventKind::Progress
        };

        self.publish(DeliveryEvent {
            delivery_id: updated.id,
            kind,
            position: next,
            target: updated.webhook,
            at: updated.updated_at,
        })
        .await;

        Ok(kind)
    }

    async fn publish(&self, event: DeliveryEvent) {
        match tokio::time::timeout(self.settings.notify_timeout, self.sink.notify(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(delivery_id = %event.delivery_id, error = %err, "notification failed");
            }
            Err(_) => {
                warn!(delivery_id = %event.delivery_id, "notification timed out");
            }
        }
    }
}

/// One bounded random step from `current` towards `destination`.
///
/// The heading deviates from the direct bearing by at most
/// [`MAX_HEADING_DEVIATION`] and the step length is drawn from
/// `[0.5, 1.0] * step_size`, capped at the remaining distance.
pub fn next_position<R>(
    rng: &mut R,
    current: GeoPoint,
    destination: GeoPoint,
    step_size: f64,
) -> GeoPoint
where
    R: Rng + ?Sized,
{
    let remaining = planar_distance(&current, &destination);
    if remaining == 0.0 {
        return destination;
    }

    let bearing = (destination.lat - current.lat).atan2(destination.lng - current.lng);
    let heading = bearing + rng.gen_range(-MAX_HEADING_DEVIATION..=MAX_HEADING_DEVIATION);
    let step = (step_size * rng.gen_range(MIN_STEP_FRACTION..=1.0)).min(remaining);

    GeoPoint {
        lat: (current.lat + step * heading.sin()).clamp(-90.0, 90.0),
        lng: (current.lng + step * heading.cos()).clamp(-180.0, 180.0),
    }
}
