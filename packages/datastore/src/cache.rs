//! The concurrent item cache.
//!
//! A keyed index of live items. `get_or_compute` is single-flight: under
//! any interleaving of concurrent callers the constructor runs at most
//! once per key, and losers receive the winner's item. Removal is
//! identity-checked so a key is never unbound from a different live item
//! than the caller holds.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use docmap_core::DataKey;

use crate::item::DataItem;

/// A keyed index of items with optional size and idle-age eviction.
pub struct DataCache<K: DataKey, T: Send + Sync + 'static> {
    map: DashMap<K, DataItem<K, T>>,
    capacity: Option<usize>,
}

impl<K: DataKey, T: Send + Sync + 'static> DataCache<K, T> {
    /// A cache with no size bound.
    pub fn unbounded() -> Self {
        Self {
            map: DashMap::new(),
            capacity: None,
        }
    }

    /// A cache that trims the least-recently-referenced items once it
    /// grows past `capacity`.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity: Some(capacity),
        }
    }

    /// Get the item for a key, or insert the one built by `ctor`.
    ///
    /// Single-flight: `ctor` runs at most once per key across concurrent
    /// callers.
    pub fn get_or_compute(
        &self,
        key: K,
        ctor: impl FnOnce(&K) -> DataItem<K, T>,
    ) -> DataItem<K, T> {
        let (item, inserted) = match self.map.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let item = ctor(entry.key());
                entry.insert(item.clone());
                (item, true)
            }
        };

        // shard lock released above; safe to scan for eviction
        if inserted {
            self.trim_to_capacity();
        }
        item
    }

    /// Get the item for a key, if one is cached.
    pub fn get_or_null(&self, key: &K) -> Option<DataItem<K, T>> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Remove an item, releasing its identity.
    ///
    /// Only removes the exact item passed in; a different live item under
    /// the same key is left alone.
    pub fn remove(&self, item: &DataItem<K, T>) -> bool {
        self.map
            .remove_if(item.key(), |_, existing| existing.same_instance(item))
            .is_some()
    }

    /// A point-in-time snapshot of all cached items, for linear scans.
    pub fn snapshot(&self) -> Vec<DataItem<K, T>> {
        self.map.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of cached items.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every cached item.
    pub fn clear(&self) {
        self.map.clear();
    }

    /// Evict items that have not been referenced within `max_idle`.
    ///
    /// Returns the number of evicted items.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let max_idle_ms = max_idle.as_millis().min(i64::MAX as u128) as i64;
        let mut evicted = 0;
        self.map.retain(|_, item| {
            let keep = item.idle_ms() <= max_idle_ms;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    fn trim_to_capacity(&self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        let excess = self.map.len().saturating_sub(capacity);
        if excess == 0 {
            return;
        }

        // LRU on last reference; oldest go first
        let mut entries: Vec<_> = self
            .map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_reference_time()))
            .collect();
        entries.sort_by_key(|(_, referenced)| *referenced);

        for (key, _) in entries.into_iter().take(excess) {
            self.map.remove(&key);
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> Default for DataCache<K, T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
