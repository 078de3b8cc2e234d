use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutexes, so at most one `perform` per key is in flight
pub(crate) struct Lanes<K: Eq + Hash> {
    lanes: DashMap<K, Arc<Mutex<()>>>,
}

/// Holds a key's lane until dropped
pub(crate) struct LaneGuard<'a, K: Eq + Hash + Clone> {
    lanes: &'a Lanes<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Lanes<K> {
    pub fn new() -> Self { Self { lanes: DashMap::new() } }

    pub async fn acquire(&self, key: &K) -> LaneGuard<'_, K> {
        // clone the Arc out so the shard lock is not held across the await
        let lane = self.lanes.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let guard = lane.lock_owned().await;
        LaneGuard { lanes: self, key: key.clone(), guard: Some(guard) }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize { self.lanes.len() }
}

impl<K: Eq + Hash + Clone> Drop for LaneGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // nobody else holds or waits on this lane: forget it
        self.lanes.lanes.remove_if(&self.key, |_, lane| Arc::strong_count(lane) == 1);
    }
}
