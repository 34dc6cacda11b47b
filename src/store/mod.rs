pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::delivery::{Delivery, DeliveryStatus};

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("delivery {0} not found")]
    NotFound(Uuid),

    #[error("delivery {id} is {actual:?}, expected {expected:?}")]
    Conflict {
        id: Uuid,
        expected: DeliveryStatus,
        actual: DeliveryStatus,
    },

    #[error("delivery {id} cannot move from {from:?} to {to:?}")]
    IllegalTransition {
        id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("delivery {0} already exists")]
    Duplicate(Uuid),

    #[error("{0}")]
    Unavailable(String),
}

/// Durable storage for deliveries.
///
/// Reads and writes are individually atomic; a read followed by a write is
/// not. `update_if_status` is the only way to mutate an existing record and
/// commits only while the stored status still equals `expected`. A write
/// that changes the status must follow a legal edge.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn insert(&self, delivery: Delivery) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Delivery>, StoreError>;

    async fn list_by_status(&self, status: DeliveryStatus) -> Result<Vec<Delivery>, StoreError>;

    async fn update_if_status(
        &self,
        expected: DeliveryStatus,
        delivery: Delivery,
    ) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
