use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::repository::RepositoryError;

/// Registry of one mutex per key.
///
/// Read-then-write sequences (count tickets then insert, list screenings then insert)
/// run while holding the key's mutex so concurrent requests for the same key observe
/// each other's writes. Requests for different keys do not contend. A key's entry is
/// dropped once its last holder leaves, so the registry only holds keys in use.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Run `f` while holding the lock for `key`.
    pub fn with<T, E>(&self, key: &K, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let lease = self.lease(key)?;
        let _held = lease.slot.lock().map_err(|_| poisoned())?;
        f()
    }

    /// Run `f` while holding the locks for every key. Locks are taken in key order
    /// so callers locking overlapping sets cannot deadlock.
    pub fn with_all<T, E>(
        &self,
        keys: impl IntoIterator<Item = K>,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        K: Ord,
        E: From<RepositoryError>,
    {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let leases = keys
            .iter()
            .map(|key| self.lease(key))
            .collect::<Result<Vec<_>, _>>()?;
        let mut held = Vec::with_capacity(leases.len());
        for lease in &leases {
            held.push(lease.slot.lock().map_err(|_| poisoned())?);
        }
        f()
    }

    fn lease(&self, key: &K) -> Result<Lease<'_, K>, RepositoryError> {
        let mut slots = self.slots.lock().map_err(|_| poisoned())?;
        let slot = slots.entry(key.clone()).or_default().clone();
        Ok(Lease {
            locks: self,
            key: key.clone(),
            slot,
        })
    }

    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }
}

/// A claim on one key's mutex. The registry entry goes away with the last claim.
struct Lease<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
    slot: Arc<Mutex<()>>,
}

impl<K: Eq + Hash> Drop for Lease<'_, K> {
    fn drop(&mut self) {
        // New claims clone the slot under the registry lock, so the count is stable here.
        if let Ok(mut slots) = self.locks.slots.lock() {
            if Arc::strong_count(&self.slot) == 2 {
                slots.remove(&self.key);
            }
        }
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("booking lock poisoned".to_string())
}
