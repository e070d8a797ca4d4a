//! Per-key async mutexes
//!
//! Serializes work on one loan or one resource inside this process. Guards
//! are owned so they can be held across the awaits of a whole saga.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct KeyedLocks {
    slots: Arc<Mutex<HashMap<i32, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: i32) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Drop slots nobody holds or waits on
        slots.retain(|k, slot| *k == key || Arc::strong_count(slot) > 1);
        slots.entry(key).or_default().clone()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: i32) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// Lock several keys in ascending order, so that overlapping sets never deadlock
    pub async fn lock_many(&self, keys: &[i32]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }
}
