//! Keyed mutual exclusion.
//!
//! Each key maps to a reference-counted async mutex that exists only while
//! somebody holds or waits for it. The entry is evicted by whoever drops the
//! last outside reference, so the map size tracks live contention rather than
//! the number of keys ever seen.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Entries<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

#[derive(Debug, Error)]
#[error("timed out after {0:?} waiting for lock")]
pub struct LockTimeout(pub Duration);

pub struct LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    entries: Entries<K>,
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Waits up to `wait` for exclusive ownership of `key`.
    pub async fn acquire(&self, key: K, wait: Duration) -> Result<LockSection<K>, LockTimeout> {
        let mutex = self.entries.entry(key.clone()).or_default().value().clone();

        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockSection {
                guard: Some(guard),
                key,
                entries: Arc::clone(&self.entries),
            }),
            Err(_) => {
                reclaim(&self.entries, &key);
                Err(LockTimeout(wait))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K> Default for LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// An exclusive section over one key. Released on drop.
pub struct LockSection<K>
where
    K: Eq + Hash + Clone,
{
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    entries: Entries<K>,
}

impl<K> LockSection<K>
where
    K: Eq + Hash + Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for LockSection<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // The guard owns a clone of the mutex Arc; release it before counting.
        drop(self.guard.take());
        reclaim(&self.entries, &self.key);
    }
}

fn reclaim<K>(entries: &DashMap<K, Arc<Mutex<()>>>, key: &K)
where
    K: Eq + Hash,
{
    // remove_if holds the shard lock, so no acquirer can clone the entry
    // between the count check and the removal.
    entries.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}
