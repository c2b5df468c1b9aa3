//! Datastore orchestration: cache probe, remote query, decode, complete.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, trace};

use docmap_core::{
    CodecContext, CodecRegistry, DataCodec, DataKey, Error, Query, Result,
};

use crate::cache::DataCache;
use crate::item::DataItem;
use crate::status::{FindAllOutcome, FindAllStatus, FindOutcome, FindStatus};
use crate::table::DataTable;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// The composition root: owns the codec registry and the executor that
/// runs asynchronous table operations.
///
/// Cheap to clone; all clones share the same registry and runtime.
#[derive(Clone)]
pub struct DataManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    registry: Arc<CodecRegistry>,
    runtime: Handle,
}

impl DataManager {
    /// Create a manager over a registry and a runtime handle.
    ///
    /// The registry is published read-only from here on.
    pub fn new(registry: impl Into<Arc<CodecRegistry>>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: registry.into(),
                runtime,
            }),
        }
    }

    /// The codec registry.
    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.inner.registry
    }

    /// The runtime asynchronous operations are spawned on.
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// A fresh per-operation codec context.
    pub fn new_codec_context(&self) -> CodecContext {
        CodecContext::new(self.inner.registry.clone())
    }

    /// Start building a datastore bound to this manager.
    pub fn datastore<K: DataKey, T: Send + Sync + 'static>(&self) -> DatastoreBuilder<K, T> {
        DatastoreBuilder {
            manager: self.clone(),
            table: None,
            codec: None,
            cache: None,
        }
    }

    pub(crate) fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.inner.runtime.block_on(future)
    }
}

pub(crate) struct DatastoreInner<K: DataKey, T: Send + Sync + 'static> {
    pub(crate) id: u64,
    pub(crate) manager: DataManager,
    pub(crate) cache: DataCache<K, T>,
    pub(crate) table: Arc<dyn DataTable>,
    pub(crate) codec: Arc<dyn DataCodec<K, T>>,
}

/// A typed datastore over one table: identity-deduplicated items, a local
/// cache of loaded values, and find/save against the backing table.
///
/// Cheap to clone; all clones share the same cache and identity space.
pub struct Datastore<K: DataKey, T: Send + Sync + 'static> {
    inner: Arc<DatastoreInner<K, T>>,
}

impl<K: DataKey, T: Send + Sync + 'static> Clone for Datastore<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> Datastore<K, T> {
    /// The manager this datastore was built from.
    pub fn manager(&self) -> &DataManager {
        &self.inner.manager
    }

    /// The cache of live items.
    pub fn cache(&self) -> &DataCache<K, T> {
        &self.inner.cache
    }

    /// The data codec values travel through.
    pub fn codec(&self) -> &Arc<dyn DataCodec<K, T>> {
        &self.inner.codec
    }

    /// Get or create the reference item for a key.
    ///
    /// The returned item is never null but may have no value yet; the
    /// same key always yields the same live item.
    pub fn get_or_reference(&self, key: K) -> DataItem<K, T> {
        let inner = &self.inner;
        inner
            .cache
            .get_or_compute(key, |k| DataItem::new(inner, k.clone()))
    }

    /// Get or create an item with a value present for a key.
    pub fn get_or_create(&self, key: K) -> Result<DataItem<K, T>> {
        let item = self.get_or_reference(key);
        item.default_if_absent()?;
        Ok(item)
    }

    /// Get the existing (possibly valueless) item for a key, or `None`.
    pub fn get_or_null(&self, key: &K) -> Option<DataItem<K, T>> {
        self.inner.cache.get_or_null(key)
    }

    /// Find a present cached item matching a query, without touching the
    /// backing table.
    ///
    /// A keyed query probes directly; otherwise the cache is scanned with
    /// the codec's compiled predicate. Returned items are marked
    /// referenced.
    pub fn find_one_cached(&self, query: &Query) -> Option<DataItem<K, T>> {
        if let Some(key_value) = query.key() {
            let key = K::from_value(key_value.clone()).ok()?;
            let item = self.inner.cache.get_or_null(&key)?;
            if item.is_present() {
                item.referenced_now();
                return Some(item);
            }
            return None;
        }

        let ctx = self.inner.manager.new_codec_context();
        let matches = self.inner.codec.query_comparator(ctx, query);
        for item in self.inner.cache.snapshot() {
            let Some(value) = item.get() else {
                continue;
            };
            if matches(value.as_ref()) {
                item.referenced_now();
                return Some(item);
            }
        }
        None
    }

    /// Find one item by query: cache first, then the backing table.
    ///
    /// A cache hit completes the returned status synchronously as
    /// `Cached`; otherwise the table is queried on the manager's runtime
    /// and the status completes `Fetched`, `Absent`, or `Failed` exactly
    /// once.
    pub fn find_one(&self, query: Query) -> FindStatus<K, T> {
        if let Some(item) = self.find_one_cached(&query) {
            trace!(key = ?item.key(), "find served from cache");
            return FindStatus::completed(query, FindOutcome::Cached(item));
        }

        let query = query.qualify(self.inner.codec.primary_key_field());
        let status = FindStatus::pending(query.clone());

        let store = self.clone();
        let task_status = status.clone();
        self.inner.manager.runtime().spawn(async move {
            let outcome = match store.inner.table.find_one(&query).await {
                Err(err) => {
                    debug!(error = %err, "remote find failed");
                    FindOutcome::Failed(Arc::new(err))
                }
                Ok(None) => FindOutcome::Absent,
                Ok(Some(input)) => match store.resolve_found(&input) {
                    Ok(item) => FindOutcome::Fetched(item),
                    Err(err) => FindOutcome::Failed(Arc::new(err)),
                },
            };
            task_status.complete(outcome);
        });

        status
    }

    /// Find one item by primary key.
    pub fn find_one_by_key(&self, key: &K) -> FindStatus<K, T> {
        self.find_one(Query::by_key(key.to_value()))
    }

    /// Find all present cached items matching a query.
    ///
    /// Always synchronous; every returned item is marked referenced.
    pub fn find_all_cached(&self, query: &Query) -> Vec<DataItem<K, T>> {
        let constraint_count = query.constraints().len();
        let mut found =
            Vec::with_capacity(self.inner.cache.len() / (constraint_count + 1));

        let ctx = self.inner.manager.new_codec_context();
        let matches = (constraint_count > 0)
            .then(|| self.inner.codec.query_comparator(ctx, query));

        for item in self.inner.cache.snapshot() {
            let Some(value) = item.get() else {
                continue;
            };
            if matches.as_ref().map_or(true, |m| m(value.as_ref())) {
                item.referenced_now();
                found.push(item);
            }
        }
        found
    }

    /// Find all items matching a query in the backing table.
    ///
    /// The aggregation itself always references the table; the individual
    /// documents resolve into cache-resident items before the status
    /// completes.
    pub fn find_all(&self, query: Query) -> FindAllStatus<K, T> {
        let query = query.qualify(self.inner.codec.primary_key_field());
        let status = FindAllStatus::pending(query.clone());

        let store = self.clone();
        let task_status = status.clone();
        self.inner.manager.runtime().spawn(async move {
            let outcome = match store.inner.table.find_all(&query).await {
                Err(err) => FindAllOutcome::Failed(Arc::new(err)),
                Ok(inputs) => {
                    let mut items = Vec::with_capacity(inputs.len());
                    let mut outcome = None;
                    for input in &inputs {
                        match store.resolve_found(input) {
                            Ok(item) => items.push(item),
                            Err(err) => {
                                outcome = Some(FindAllOutcome::Failed(Arc::new(err)));
                                break;
                            }
                        }
                    }
                    outcome.unwrap_or(FindAllOutcome::Loaded(items))
                }
            };
            task_status.complete(outcome);
        });

        status
    }

    /// Resolve a fetched document into a cache-resident, decoded item.
    fn resolve_found(&self, input: &docmap_core::DocumentInput) -> Result<DataItem<K, T>> {
        use docmap_core::DecodeInput;

        let key_field = self.inner.codec.primary_key_field();
        let key_value = input.read_key(key_field, &K::type_desc())?;
        if key_value.is_null() {
            return Err(Error::MissingPrimaryKey(key_field.to_string()));
        }
        let key = K::from_value(key_value)?;

        let item = self.get_or_reference(key);
        item.decode(input)?;
        item.fetched_now();
        Ok(item)
    }
}

/// Builds a [`Datastore`]; obtained from [`DataManager::datastore`].
pub struct DatastoreBuilder<K: DataKey, T: Send + Sync + 'static> {
    manager: DataManager,
    table: Option<Arc<dyn DataTable>>,
    codec: Option<Arc<dyn DataCodec<K, T>>>,
    cache: Option<DataCache<K, T>>,
}

impl<K: DataKey, T: Send + Sync + 'static> DatastoreBuilder<K, T> {
    /// The backing table.
    pub fn table(mut self, table: impl DataTable + 'static) -> Self {
        self.table = Some(Arc::new(table));
        self
    }

    /// A backing table shared with other owners.
    pub fn shared_table(mut self, table: Arc<dyn DataTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// The data codec for this store's values.
    pub fn codec(mut self, codec: impl DataCodec<K, T> + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// The item cache. Defaults to an unbounded cache.
    pub fn cache(mut self, cache: DataCache<K, T>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Finish the datastore.
    pub fn build(self) -> Result<Datastore<K, T>> {
        let table = self
            .table
            .ok_or_else(|| Error::Config("datastore requires a source table".into()))?;
        let codec = self
            .codec
            .ok_or_else(|| Error::Config("datastore requires a data codec".into()))?;

        Ok(Datastore {
            inner: Arc::new(DatastoreInner {
                id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
                manager: self.manager,
                cache: self.cache.unwrap_or_default(),
                table,
                codec,
            }),
        })
    }
}
