//! Per-key serialization primitives.
//!
//! [`KeyedLocks`] serializes work on the same key while letting different
//! keys proceed in parallel. [`InFlight`] refuses, rather than queues, a
//! second holder of the same key.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key, created on first use.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of keys with a lock allocated.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Drop locks nobody holds or waits for.
    pub async fn cleanup(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Set of keys currently being worked on.
pub struct InFlight<K: Eq + Hash> {
    active: Arc<StdMutex<HashSet<K>>>,
}

/// Removes its key from the [`InFlight`] set when dropped.
pub struct InFlightGuard<K: Eq + Hash> {
    active: Arc<StdMutex<HashSet<K>>>,
    key: Option<K>,
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    pub fn new() -> Self {
        Self {
            active: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// Claim `key`, or `None` if someone already holds it.
    pub fn try_enter(&self, key: K) -> Option<InFlightGuard<K>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            key: Some(key),
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for InFlight<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}
