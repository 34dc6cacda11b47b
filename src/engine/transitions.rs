use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::locks::LockRegistry;
use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus, GeoPoint, NewDelivery};
use crate::observability::metrics::Metrics;
use crate::store::{DeliveryStore, StoreError};

const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcceptOutcome {
    Won,
    Lost,
}

impl AcceptOutcome {
    pub fn won(self) -> bool {
        self == AcceptOutcome::Won
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

/// Applies Submit, Cancel and Accept against the store.
///
/// Accept runs its read-check-write inside a per-delivery lock section, and
/// every write is conditioned on the status that was read, so a second
/// process sharing the store still cannot double-transition a delivery.
pub struct DeliveryStateMachine {
    store: Arc<dyn DeliveryStore>,
    locks: LockRegistry<Uuid>,
    lock_timeout: Duration,
    metrics: Metrics,
}

impl DeliveryStateMachine {
    pub fn new(store: Arc<dyn DeliveryStore>, lock_timeout: Duration, metrics: Metrics) -> Self {
        Self {
            store,
            locks: LockRegistry::new(),
            lock_timeout,
            metrics,
        }
    }

    pub async fn submit(&self, request: NewDelivery) -> Result<Delivery, AppError> {
        let created_by = required_identity(request.created_by.as_deref(), "created_by")?;
        let pickup = required_point(request.pickup, "pickup")?;
        let destination = required_point(request.destination, "destination")?;
        let webhook = validate_webhook(request.webhook)?;

        let now = Utc::now();
        let delivery = Delivery {
            id: Uuid::new_v4(),
            created_by,
            handler: None,
            pickup,
            destination,
            current: None,
            status: DeliveryStatus::WaitingForAccept,
            webhook,
            contact: request.contact,
            pickup_address: request.pickup_address,
            destination_address: request.destination_address,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(delivery.clone()).await?;
        self.count_transition(DeliveryStatus::WaitingForAccept);

        info!(
            delivery_id = %delivery.id,
            created_by = %delivery.created_by,
            "delivery submitted"
        );

        Ok(delivery)
    }

    pub async fn cancel(&self, id: Uuid, requester: &str) -> Result<Delivery, AppError> {
        let requester = required_identity(Some(requester), "requester")?;
        let mut delivery = self.load(id).await?;

        if delivery.created_by != requester {
            return Err(AppError::InvalidStateTransition(format!(
                "delivery {id} can only be canceled by its creator"
            )));
        }
        if !delivery.status.can_transition_to(DeliveryStatus::Canceled) {
            return Err(AppError::InvalidStateTransition(format!(
                "delivery {id} is {:?} and can no longer be canceled",
                delivery.status
            )));
        }

        let previous = delivery.status;
        delivery.status = DeliveryStatus::Canceled;
        delivery.updated_at = Utc::now();

        match self.store.update_if_status(previous, delivery.clone()).await {
            Ok(()) => {}
            Err(StoreError::Conflict { actual, .. }) => {
                return Err(AppError::InvalidStateTransition(format!(
                    "delivery {id} became {actual:?} before it could be canceled"
                )));
            }
            Err(err) => return Err(err.into()),
        }

        self.count_transition(DeliveryStatus::Canceled);
        info!(delivery_id = %id, requester = %requester, "delivery canceled");

        Ok(delivery)
    }

    /// Claims a waiting delivery for `handler`. Losing the race is `Ok(Lost)`.
    pub async fn accept(&self, id: Uuid, handler: &str) -> Result<AcceptOutcome, AppError> {
        let handler = required_identity(Some(handler), "handler")?;

        let section = match self.locks.acquire(id, self.lock_timeout).await {
            Ok(section) => section,
            Err(err) => {
                self.record_lock_entries();
                self.metrics
                    .accept_attempts_total
                    .with_label_values(&["busy"])
                    .inc();
                return Err(AppError::Busy(format!("delivery {id}: {err}")));
            }
        };
        self.record_lock_entries();

        let outcome = self.claim(id, &handler).await;
        drop(section);
        self.record_lock_entries();

        let outcome = outcome?;
        let label = match outcome {
            AcceptOutcome::Won => "won",
            AcceptOutcome::Lost => "lost",
        };
        self.metrics
            .accept_attempts_total
            .with_label_values(&[label])
            .inc();

        Ok(outcome)
    }

    async fn claim(&self, id: Uuid, handler: &str) -> Result<AcceptOutcome, AppError> {
        let mut delivery = self.load(id).await?;

        if delivery.status != DeliveryStatus::WaitingForAccept {
            debug!(delivery_id = %id, handler = %handler, status = ?delivery.status, "accept lost");
            return Ok(AcceptOutcome::Lost);
        }

        delivery.status = DeliveryStatus::InProgress;
        delivery.handler = Some(handler.to_string());
        delivery.current = Some(delivery.pickup);
        delivery.updated_at = Utc::now();

        match self
            .store
            .update_if_status(DeliveryStatus::WaitingForAccept, delivery)
            .await
        {
            Ok(()) => {
                self.count_transition(DeliveryStatus::InProgress);
                info!(delivery_id = %id, handler = %handler, "delivery accepted");
                Ok(AcceptOutcome::Won)
            }
            Err(StoreError::Conflict { actual, .. }) => {
                warn!(
                    delivery_id = %id,
                    handler = %handler,
                    status = ?actual,
                    "accept lost to a concurrent writer"
                );
                Ok(AcceptOutcome::Lost)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Delivery, AppError> {
        self.load(id).await
    }

    pub async fn list_in_progress(&self, page: Page) -> Result<Vec<Delivery>, AppError> {
        let per_page = page.per_page.clamp(1, MAX_PER_PAGE);
        let skip = page.page.max(1).saturating_sub(1).saturating_mul(per_page);

        let deliveries = self
            .store
            .list_by_status(DeliveryStatus::InProgress)
            .await?;

        Ok(deliveries.into_iter().skip(skip).take(per_page).collect())
    }

    async fn load(&self, id: Uuid) -> Result<Delivery, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
    }

    fn record_lock_entries(&self) {
        self.metrics
            .lock_registry_entries
            .set(self.locks.len() as i64);
    }

    fn count_transition(&self, to: DeliveryStatus) {
        self.metrics
            .transitions_total
            .with_label_values(&[to.as_str()])
            .inc();
    }
}

pub(crate) fn required_identity(value: Option<&str>, field: &str) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(identity) if !identity.is_empty() => Ok(identity.to_string()),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

fn required_point(value: Option<GeoPoint>, field: &str) -> Result<GeoPoint, AppError> {
    let point = value.ok_or_else(|| AppError::Validation(format!("{field} is required")))?;
    if !point.is_valid() {
        return Err(AppError::Validation(format!(
            "{field} must be a finite coordinate with lat in [-90, 90] and lng in [-180, 180]"
        )));
    }
    Ok(point)
}

fn validate_webhook(value: Option<String>) -> Result<Option<String>, AppError> {
    match value.map(|raw| raw.trim().to_string()) {
        None => Ok(None),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(Some(url)),
        Some(url) => Err(AppError::Validation(format!(
            "webhook must be an http(s) address, got {url:?}"
        ))),
    }
}
