//! Item handles: identity-bearing references into a datastore.
//!
//! An item is shared: the cache holds one handle, every caller holds
//! clones, and all of them observe the same value slot. The value is
//! published as an atomic pointer swap of a fully constructed value, so
//! readers never see a half-populated object. The back-reference to the
//! datastore is non-owning; the datastore owns the cache, which owns the
//! items.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwapOption;
use tracing::trace;

use docmap_core::{DataKey, DocumentInput, Error, Query, Result};

use crate::datastore::DatastoreInner;

/// Offsets are milliseconds since item creation, saturating at the
/// maximum representable offset.
const MAX_OFFSET_MS: i64 = u32::MAX as i64;
const NEVER: i64 = -1;

struct ItemInner<K: DataKey, T: Send + Sync + 'static> {
    store: Weak<DatastoreInner<K, T>>,
    store_id: u64,
    key: K,
    value: ArcSwapOption<T>,
    created_at: SystemTime,
    created_instant: Instant,
    last_fetch_ms: AtomicI64,
    last_reference_ms: AtomicI64,
}

/// A reference to one logical record of a datastore.
///
/// Identity is `(datastore, key)`: within one datastore there is at most
/// one live item per key, and equality and hashing follow that identity
/// rather than the value.
pub struct DataItem<K: DataKey, T: Send + Sync + 'static> {
    inner: Arc<ItemInner<K, T>>,
}

impl<K: DataKey, T: Send + Sync + 'static> Clone for DataItem<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> DataItem<K, T> {
    pub(crate) fn new(store: &Arc<DatastoreInner<K, T>>, key: K) -> Self {
        Self {
            inner: Arc::new(ItemInner {
                store: Arc::downgrade(store),
                store_id: store.id,
                key,
                value: ArcSwapOption::empty(),
                created_at: SystemTime::now(),
                created_instant: Instant::now(),
                last_fetch_ms: AtomicI64::new(NEVER),
                last_reference_ms: AtomicI64::new(0),
            }),
        }
    }

    fn store(&self) -> Result<Arc<DatastoreInner<K, T>>> {
        self.inner.store.upgrade().ok_or(Error::StoreDetached)
    }

    /// The primary key of this item. Never changes.
    pub fn key(&self) -> &K {
        &self.inner.key
    }

    /// Whether a value is present.
    pub fn is_present(&self) -> bool {
        self.inner.value.load().is_some()
    }

    /// The current value, if present.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.value.load_full()
    }

    /// Replace the value wholesale.
    pub fn set(&self, value: T) {
        self.inner.value.store(Some(Arc::new(value)));
    }

    /// Mutate the value through clone-on-write publication.
    ///
    /// Returns false without calling `f` when no value is present. `f`
    /// may run more than once under contention; keep it pure.
    pub fn update<F>(&self, f: F) -> bool
    where
        T: Clone,
        F: Fn(&mut T),
    {
        if !self.is_present() {
            return false;
        }
        self.inner.value.rcu(|current| {
            current.as_ref().map(|arc| {
                let mut value = (**arc).clone();
                f(&mut value);
                Arc::new(value)
            })
        });
        true
    }

    /// Create a default value for this item if none is present.
    pub fn default_if_absent(&self) -> Result<&Self> {
        if !self.is_present() {
            let store = self.store()?;
            let value = store.codec.create_default(&self.inner.key);
            self.inner.value.store(Some(Arc::new(value)));
        }
        Ok(self)
    }

    /// Replace the value with a fresh default, unconditionally.
    pub fn reset_to_defaults(&self) -> Result<&Self> {
        let store = self.store()?;
        let value = store.codec.create_default(&self.inner.key);
        self.inner.value.store(Some(Arc::new(value)));
        Ok(self)
    }

    /// Decode a document into this item's value.
    ///
    /// The value is constructed and fully populated before it is
    /// published; concurrent readers see either the old value or the new
    /// one, never a half-decoded object.
    pub fn decode(&self, input: &DocumentInput) -> Result<&Self> {
        let store = self.store()?;
        let ctx = store.manager.new_codec_context();
        let mut value = store.codec.construct(&ctx, input)?;
        store.codec.decode(&ctx, &mut value, input)?;
        self.inner.value.store(Some(Arc::new(value)));
        Ok(self)
    }

    /// Serialize and update this item in the backing table.
    ///
    /// A no-op when no value is present.
    pub async fn save_async(&self) -> Result<()> {
        let Some(value) = self.get() else {
            return Ok(());
        };
        let store = self.store()?;
        let ctx = store.manager.new_codec_context();

        let mut output = store.table.create_output();
        output.set_key(&ctx, store.codec.primary_key_field(), &self.inner.key.to_value())?;
        store.codec.encode(&ctx, &value, &mut output)?;

        trace!(key = ?self.inner.key, "saving item");
        store.table.replace_one(output).await
    }

    /// Blocking form of [`save_async`](Self::save_async).
    ///
    /// Must not be called from within the manager's runtime.
    pub fn save_sync(&self) -> Result<()> {
        let store = self.store()?;
        store.manager.block_on(self.save_async())
    }

    /// Fetch this item's document from the backing table and decode it.
    ///
    /// An absent document leaves the current value untouched.
    pub async fn fetch_async(&self) -> Result<&Self> {
        let store = self.store()?;
        let query =
            Query::by_key(self.inner.key.to_value()).qualify(store.codec.primary_key_field());

        trace!(key = ?self.inner.key, "fetching item");
        if let Some(input) = store.table.find_one(&query).await? {
            self.decode(&input)?;
            self.fetched_now();
        }
        Ok(self)
    }

    /// Blocking form of [`fetch_async`](Self::fetch_async).
    ///
    /// Must not be called from within the manager's runtime.
    pub fn fetch_sync(&self) -> Result<&Self> {
        let store = self.store()?;
        store.manager.block_on(self.fetch_async())
    }

    /// Remove this item from its datastore's cache, releasing the
    /// identity. A later reference to the same key produces a fresh item.
    pub fn dispose(&self) {
        if let Some(store) = self.inner.store.upgrade() {
            store.cache.remove(self);
        }
    }

    /// When this item handle was created.
    pub fn created_at(&self) -> SystemTime {
        self.inner.created_at
    }

    /// When this item was last decoded from the table, if ever.
    pub fn last_fetch_time(&self) -> Option<SystemTime> {
        let ms = self.inner.last_fetch_ms.load(Ordering::Relaxed);
        if ms < 0 {
            None
        } else {
            Some(self.inner.created_at + Duration::from_millis(ms as u64))
        }
    }

    /// When this item was last returned from a lookup.
    pub fn last_reference_time(&self) -> SystemTime {
        let ms = self.inner.last_reference_ms.load(Ordering::Relaxed);
        self.inner.created_at + Duration::from_millis(ms.max(0) as u64)
    }

    /// Whether two handles refer to the same live item.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn offset_now(&self) -> i64 {
        let elapsed = self.inner.created_instant.elapsed().as_millis();
        elapsed.min(MAX_OFFSET_MS as u128) as i64
    }

    pub(crate) fn referenced_now(&self) {
        self.inner
            .last_reference_ms
            .fetch_max(self.offset_now(), Ordering::Relaxed);
    }

    pub(crate) fn fetched_now(&self) {
        self.inner
            .last_fetch_ms
            .fetch_max(self.offset_now(), Ordering::Relaxed);
    }

    pub(crate) fn idle_ms(&self) -> i64 {
        self.offset_now() - self.inner.last_reference_ms.load(Ordering::Relaxed)
    }
}

impl<K: DataKey, T: Send + Sync + 'static> PartialEq for DataItem<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.store_id == other.inner.store_id && self.inner.key == other.inner.key
    }
}

impl<K: DataKey, T: Send + Sync + 'static> Eq for DataItem<K, T> {}

impl<K: DataKey, T: Send + Sync + 'static> Hash for DataItem<K, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.store_id.hash(state);
        self.inner.key.hash(state);
    }
}

impl<K: DataKey, T: Send + Sync + 'static> fmt::Debug for DataItem<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataItem")
            .field("key", &self.inner.key)
            .field("present", &self.is_present())
            .finish()
    }
}
