//! Registry of lazily created per-key mutexes.
//!
//! Serializes read-modify-write sequences scoped to one identity (a student,
//! a difficulty level) while leaving distinct keys fully independent.
//! Mutexes are created on first use and kept for the registry's lifetime.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::mutex::{Mutex, OwnedMutexGuard};

/// Exclusive hold on one key of a [`KeyedMutexRegistry`].
pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Debug)]
pub struct KeyedMutexRegistry<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedMutexRegistry<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Run `f` while holding the key's lock; released on every exit path.
    pub async fn with_lock<F, Fut, R>(&self, key: K, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        f().await
    }

    /// Acquire the key's lock as an owned guard.
    pub async fn lock(&self, key: K) -> KeyGuard {
        self.lock_for(key).lock_owned().await
    }

    /// Number of keys that have a mutex.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.locks.contains_key(key)
    }

    /// Get-or-create in one step: the shard lock held by `entry` makes
    /// concurrent first accesses agree on a single mutex.
    fn lock_for(&self, key: K) -> Arc<Mutex<()>> {
        let entry = self.locks.entry(key).or_insert_with(|| {
            trace!("creating key mutex");
            Arc::new(Mutex::new(()))
        });
        Arc::clone(entry.value())
    }
}

impl<K> Default for KeyedMutexRegistry<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
