use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::store::{DeliveryStore, StoreError};

#[derive(Default)]
pub struct InMemoryStore {
    deliveries: DashMap<Uuid, Delivery>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryStore for InMemoryStore {
    async fn insert(&self, delivery: Delivery) -> Result<(), StoreError> {
        match self.deliveries.entry(delivery.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(delivery.id)),
            Entry::Vacant(slot) => {
                slot.insert(delivery);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Delivery>, StoreError> {
        Ok(self.deliveries.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_by_status(&self, status: DeliveryStatus) -> Result<Vec<Delivery>, StoreError> {
        let mut deliveries: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect();

        deliveries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(deliveries)
    }

    async fn update_if_status(
        &self,
        expected: DeliveryStatus,
        delivery: Delivery,
    ) -> Result<(), StoreError> {
        if delivery.status != expected && !expected.can_transition_to(delivery.status) {
            return Err(StoreError::IllegalTransition {
                id: delivery.id,
                from: expected,
                to: delivery.status,
            });
        }

        // The shard write lock is held across the compare and the swap.
        let mut stored = self
            .deliveries
            .get_mut(&delivery.id)
            .ok_or(StoreError::NotFound(delivery.id))?;

        if stored.status != expected {
            return Err(StoreError::Conflict {
                id: delivery.id,
                expected,
                actual: stored.status,
            });
        }

        *stored = delivery;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.deliveries.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::InMemoryStore;
    use crate::models::delivery::{ContactDetails, Delivery, DeliveryStatus, GeoPoint};
    use crate::store::{DeliveryStore, StoreError};

    fn delivery(status: DeliveryStatus) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            created_by: "shop-1".to_string(),
            handler: None,
            pickup: GeoPoint::new(0.0, 0.0),
            destination: GeoPoint::new(1.0, 1.0),
            current: None,
            status,
            webhook: None,
            contact: ContactDetails::default(),
            pickup_address: None,
            destination_address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = InMemoryStore::new();
        let d = delivery(DeliveryStatus::WaitingForAccept);

        store.insert(d.clone()).await.unwrap();
        let err = store.insert(d).await.unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn conditional_update_commits_only_on_expected_status() {
        let store = InMemoryStore::new();
        let d = delivery(DeliveryStatus::WaitingForAccept);
        store.insert(d.clone()).await.unwrap();

        let mut accepted = d.clone();
        accepted.status = DeliveryStatus::InProgress;
        store
            .update_if_status(DeliveryStatus::WaitingForAccept, accepted)
            .await
            .unwrap();

        let mut canceled = d.clone();
        canceled.status = DeliveryStatus::Canceled;
        let err = store
            .update_if_status(DeliveryStatus::WaitingForAccept, canceled)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Conflict {
                actual: DeliveryStatus::InProgress,
                ..
            }
        ));
        let stored = store.get(d.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::InProgress);
    }

    #[tokio::test]
    async fn update_rejects_illegal_edges() {
        let store = InMemoryStore::new();
        let d = delivery(DeliveryStatus::Delivered);
        store.insert(d.clone()).await.unwrap();

        let mut revived = d.clone();
        revived.status = DeliveryStatus::InProgress;
        let err = store
            .update_if_status(DeliveryStatus::Delivered, revived)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::IllegalTransition {
                from: DeliveryStatus::Delivered,
                to: DeliveryStatus::InProgress,
                ..
            }
        ));
        let stored = store.get(d.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update_if_status(
                DeliveryStatus::WaitingForAccept,
                delivery(DeliveryStatus::InProgress),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let store = InMemoryStore::new();
        store
            .insert(delivery(DeliveryStatus::InProgress))
            .await
            .unwrap();
        store
            .insert(delivery(DeliveryStatus::WaitingForAccept))
            .await
            .unwrap();
        store
            .insert(delivery(DeliveryStatus::InProgress))
            .await
            .unwrap();

        let active = store
            .list_by_status(DeliveryStatus::InProgress)
            .await
            .unwrap();

        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|d| d.status == DeliveryStatus::InProgress));
        assert_eq!(store.count().await.unwrap(), 3);
    }
}
