//! docmap datastores: typed, cached views over document tables.
//!
//! A [`Datastore`] deduplicates identity per primary key, caches loaded
//! values, and coordinates the find/fetch pipeline: cache probe, remote
//! query on the manager's runtime, codec-driven decode, and single
//! completion of the caller's status handle.
//!
//! - [`DataManager`]: composition root holding the codec registry and runtime
//! - [`Datastore`]: per-table facade built via [`DataManager::datastore`]
//! - [`DataItem`]: identity-bearing handle `(datastore, key)` with a
//!   possibly absent value
//! - [`DataCache`]: concurrent single-flight index of live items
//! - [`DataTable`]: the seam to the backing store
//! - [`FindStatus`] / [`FindAllStatus`]: one-shot completion handles
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = DataManager::new(registry, tokio::runtime::Handle::current());
//! let users = manager
//!     .datastore::<i64, User>()
//!     .table(table)
//!     .codec(UserCodec)
//!     .cache(DataCache::bounded(10_000))
//!     .build()?;
//!
//! match users.find_one(Query::by_key(42i64)).await_outcome().await {
//!     FindOutcome::Cached(item) | FindOutcome::Fetched(item) => { /* ... */ }
//!     FindOutcome::Absent => { /* ... */ }
//!     FindOutcome::Failed(err) => return Err((**err).to_string().into()),
//! }
//! ```

mod cache;
mod datastore;
mod item;
mod status;
mod table;

pub use cache::DataCache;
pub use datastore::{DataManager, Datastore, DatastoreBuilder};
pub use item::DataItem;
pub use status::{FindAllOutcome, FindAllStatus, FindOutcome, FindStatus};
pub use table::DataTable;

// Re-export the core types the public surface speaks in
pub use docmap_core::{
    DataCodec, DataKey, DataValue, Document, DocumentInput, EncodeOutput, Error, Query, Result,
};
