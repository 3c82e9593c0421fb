//! Generic keyed cache with stale-while-revalidate semantics.
//!
//! Every key owns a slot holding the current materialized value, a stale flag
//! and a `watch` channel observers can subscribe to. Writes are synchronous
//! and applied under a single lock, so writes to the same key land in the
//! order they were issued and readers never see a partially applied value.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

struct Slot<V> {
    value: Option<Arc<V>>,
    stale: bool,
    tx: watch::Sender<Option<Arc<V>>>,
}

impl<V> Slot<V> {
    fn empty() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            value: None,
            stale: false,
            tx,
        }
    }

    fn replace(&mut self, value: Arc<V>) {
        self.value = Some(Arc::clone(&value));
        self.tx.send_replace(Some(value));
    }
}

/// Keyed container of materialized values.
///
/// Updater closures run while the store lock is held: they must not call back
/// into the same store.
pub struct CacheStore<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for CacheStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        // Updaters are plain data transforms; a panic inside one leaves the
        // previous value in place, so the map is still consistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots().get(key).and_then(|slot| slot.value.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots()
            .get(key)
            .is_some_and(|slot| slot.value.is_some())
    }

    /// Replace the value for `key`. Clears the stale flag.
    pub fn set(&self, key: K, value: V) {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_insert_with(Slot::empty);
        slot.stale = false;
        slot.replace(Arc::new(value));
    }

    /// Replace the value for `key` with the result of `updater`, which
    /// receives the previous value (or `None`).
    pub fn update<F>(&self, key: K, updater: F) -> Arc<V>
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_insert_with(Slot::empty);
        let next = Arc::new(updater(slot.value.as_deref()));
        slot.replace(Arc::clone(&next));
        next
    }

    /// Like [`update`](Self::update) but only runs when a value exists, and
    /// lets the updater decline by returning `None`.
    ///
    /// Returns whether the value was replaced.
    pub fn update_existing<F>(&self, key: &K, updater: F) -> bool
    where
        F: FnOnce(&V) -> Option<V>,
    {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        let Some(current) = slot.value.as_deref() else {
            return false;
        };
        match updater(current) {
            Some(next) => {
                slot.replace(Arc::new(next));
                true
            }
            None => false,
        }
    }

    /// General conditional write: `updater` sees the previous value and
    /// returns an optional replacement plus a result handed back to the caller.
    pub fn try_update<F, R>(&self, key: K, updater: F) -> R
    where
        F: FnOnce(Option<&V>) -> (Option<V>, R),
    {
        let mut slots = self.slots();
        let current = slots.get(&key).and_then(|slot| slot.value.as_deref());
        let (next, result) = updater(current);
        if let Some(next) = next {
            slots
                .entry(key)
                .or_insert_with(Slot::empty)
                .replace(Arc::new(next));
        }
        result
    }

    /// Mark the value for `key` as stale without clearing it.
    ///
    /// Returns `false` if there is nothing cached under `key`.
    pub fn invalidate(&self, key: &K) -> bool {
        match self.slots().get_mut(key) {
            Some(slot) if slot.value.is_some() => {
                slot.stale = true;
                true
            }
            _ => false,
        }
    }

    /// Clear the stale flag after a successful revalidation.
    pub fn mark_fresh(&self, key: &K) {
        if let Some(slot) = self.slots().get_mut(key) {
            slot.stale = false;
        }
    }

    pub fn is_stale(&self, key: &K) -> bool {
        self.slots().get(key).is_some_and(|slot| slot.stale)
    }

    /// Observe the value of `key`. Creates an empty slot if needed.
    pub fn subscribe(&self, key: K) -> watch::Receiver<Option<Arc<V>>> {
        let mut slots = self.slots();
        slots.entry(key).or_insert_with(Slot::empty).tx.subscribe()
    }

    /// Keys that currently hold a value.
    pub fn keys(&self) -> Vec<K> {
        self.slots()
            .iter()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Drop the slot for `key` if nobody is subscribed to it.
    ///
    /// Returns whether the slot was removed.
    pub fn evict_if_unobserved(&self, key: &K) -> bool {
        let mut slots = self.slots();
        let unobserved = slots
            .get(key)
            .is_some_and(|slot| slot.tx.receiver_count() == 0);
        if unobserved {
            slots.remove(key);
        }
        unobserved
    }

    /// Remove every value. Subscribers observe `None`.
    pub fn clear(&self) {
        let mut slots = self.slots();
        for slot in slots.values_mut() {
            slot.value = None;
            slot.stale = false;
            slot.tx.send_replace(None);
        }
        slots.retain(|_, slot| slot.tx.receiver_count() > 0);
    }
}
