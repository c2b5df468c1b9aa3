//! Completion handles for find operations.
//!
//! A status is a one-shot cell: it starts pending and is completed exactly
//! once, by whichever of the pipeline or `cancel()` gets there first.
//! Waiters park on a `Notify` and re-check the cell, so a completion that
//! lands between the check and the park is never lost.

use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

use docmap_core::{DataKey, Error, Query};

use crate::item::DataItem;

/// Terminal outcome of a [`find_one`](crate::Datastore::find_one) call.
#[derive(Debug)]
pub enum FindOutcome<K: DataKey, T: Send + Sync + 'static> {
    /// A present item matched in the cache; the table was not consulted.
    Cached(DataItem<K, T>),
    /// The item was fetched from the table and decoded.
    Fetched(DataItem<K, T>),
    /// The table had no matching document.
    Absent,
    /// The find failed; decode errors and remote failures both land here.
    Failed(Arc<Error>),
}

impl<K: DataKey, T: Send + Sync + 'static> Clone for FindOutcome<K, T> {
    fn clone(&self) -> Self {
        match self {
            FindOutcome::Cached(item) => FindOutcome::Cached(item.clone()),
            FindOutcome::Fetched(item) => FindOutcome::Fetched(item.clone()),
            FindOutcome::Absent => FindOutcome::Absent,
            FindOutcome::Failed(err) => FindOutcome::Failed(err.clone()),
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> FindOutcome<K, T> {
    /// The found item, for the successful outcomes that carry one.
    pub fn item(&self) -> Option<&DataItem<K, T>> {
        match self {
            FindOutcome::Cached(item) | FindOutcome::Fetched(item) => Some(item),
            _ => None,
        }
    }

    /// Whether the find completed without failing.
    pub fn is_success(&self) -> bool {
        !matches!(self, FindOutcome::Failed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&Arc<Error>> {
        match self {
            FindOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

struct Shared<O> {
    query: Query,
    outcome: OnceLock<O>,
    notify: Notify,
}

impl<O> Shared<O> {
    fn pending(query: Query) -> Arc<Self> {
        Arc::new(Self {
            query,
            outcome: OnceLock::new(),
            notify: Notify::new(),
        })
    }

    fn completed(query: Query, outcome: O) -> Arc<Self> {
        let shared = Self::pending(query);
        let _ = shared.outcome.set(outcome);
        shared
    }

    fn complete(&self, outcome: O) -> bool {
        let won = self.outcome.set(outcome).is_ok();
        if won {
            self.notify.notify_waiters();
        }
        won
    }

    async fn wait(&self) -> &O {
        loop {
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before re-checking so a completion in between
            // still wakes us
            notified.as_mut().enable();
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            notified.await;
        }
    }
}

/// The status handle of one `find_one` call.
///
/// Cheap to clone; all clones observe the same single completion.
pub struct FindStatus<K: DataKey, T: Send + Sync + 'static> {
    shared: Arc<Shared<FindOutcome<K, T>>>,
}

impl<K: DataKey, T: Send + Sync + 'static> Clone for FindStatus<K, T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> FindStatus<K, T> {
    pub(crate) fn pending(query: Query) -> Self {
        Self {
            shared: Shared::pending(query),
        }
    }

    pub(crate) fn completed(query: Query, outcome: FindOutcome<K, T>) -> Self {
        Self {
            shared: Shared::completed(query, outcome),
        }
    }

    pub(crate) fn complete(&self, outcome: FindOutcome<K, T>) -> bool {
        self.shared.complete(outcome)
    }

    /// The query this find was issued with.
    pub fn query(&self) -> &Query {
        &self.shared.query
    }

    /// Whether a terminal outcome has been delivered.
    pub fn is_complete(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// The outcome, if already delivered.
    pub fn outcome(&self) -> Option<&FindOutcome<K, T>> {
        self.shared.outcome.get()
    }

    /// Wait for the terminal outcome.
    pub async fn await_outcome(&self) -> &FindOutcome<K, T> {
        self.shared.wait().await
    }

    /// The found item, once complete.
    pub fn item(&self) -> Option<&DataItem<K, T>> {
        self.outcome().and_then(FindOutcome::item)
    }

    /// Cancel delivery of this find.
    ///
    /// Cooperative: the in-flight table query is not aborted, and a
    /// result that arrives later still lands in the cache for subsequent
    /// finds - only this handle's completion is forestalled. Returns
    /// false when the find already completed.
    pub fn cancel(&self) -> bool {
        self.complete(FindOutcome::Failed(Arc::new(Error::Cancelled)))
    }
}

/// Terminal outcome of a [`find_all`](crate::Datastore::find_all) call.
#[derive(Debug)]
pub enum FindAllOutcome<K: DataKey, T: Send + Sync + 'static> {
    /// Every matched document resolved to a cache-resident item.
    Loaded(Vec<DataItem<K, T>>),
    /// The find failed; a single bad document fails the whole bulk.
    Failed(Arc<Error>),
}

impl<K: DataKey, T: Send + Sync + 'static> Clone for FindAllOutcome<K, T> {
    fn clone(&self) -> Self {
        match self {
            FindAllOutcome::Loaded(items) => FindAllOutcome::Loaded(items.clone()),
            FindAllOutcome::Failed(err) => FindAllOutcome::Failed(err.clone()),
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> FindAllOutcome<K, T> {
    /// The loaded items, when successful.
    pub fn items(&self) -> Option<&[DataItem<K, T>]> {
        match self {
            FindAllOutcome::Loaded(items) => Some(items),
            FindAllOutcome::Failed(_) => None,
        }
    }
}

/// The status handle of one `find_all` call.
pub struct FindAllStatus<K: DataKey, T: Send + Sync + 'static> {
    shared: Arc<Shared<FindAllOutcome<K, T>>>,
}

impl<K: DataKey, T: Send + Sync + 'static> Clone for FindAllStatus<K, T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K: DataKey, T: Send + Sync + 'static> FindAllStatus<K, T> {
    pub(crate) fn pending(query: Query) -> Self {
        Self {
            shared: Shared::pending(query),
        }
    }

    pub(crate) fn complete(&self, outcome: FindAllOutcome<K, T>) -> bool {
        self.shared.complete(outcome)
    }

    /// The query this find was issued with.
    pub fn query(&self) -> &Query {
        &self.shared.query
    }

    /// Whether a terminal outcome has been delivered.
    pub fn is_complete(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// The outcome, if already delivered.
    pub fn outcome(&self) -> Option<&FindAllOutcome<K, T>> {
        self.shared.outcome.get()
    }

    /// Wait for the terminal outcome.
    pub async fn await_outcome(&self) -> &FindAllOutcome<K, T> {
        self.shared.wait().await
    }

    /// Cancel delivery of this find. Same cooperative semantics as
    /// [`FindStatus::cancel`].
    pub fn cancel(&self) -> bool {
        self.complete(FindAllOutcome::Failed(Arc::new(Error::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Status = FindStatus<i64, String>;

    #[tokio::test]
    async fn exactly_one_completion_wins() {
        let status = Status::pending(Query::by_key(1i64));
        assert!(!status.is_complete());

        assert!(status.complete(FindOutcome::Absent));
        assert!(!status.complete(FindOutcome::Failed(Arc::new(Error::Cancelled))));

        assert!(matches!(status.outcome(), Some(FindOutcome::Absent)));
    }

    #[tokio::test]
    async fn await_sees_completion_from_another_clone() {
        let status = Status::pending(Query::by_key(1i64));
        let completer = status.clone();

        let waiter = tokio::spawn(async move {
            let outcome = status.await_outcome().await;
            outcome.is_success()
        });

        tokio::task::yield_now().await;
        completer.complete(FindOutcome::Absent);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn await_on_precompleted_status_returns_immediately() {
        let status = Status::completed(Query::by_key(1i64), FindOutcome::Absent);
        assert!(status.await_outcome().await.is_success());
    }

    #[tokio::test]
    async fn cancel_completes_with_cancelled_failure() {
        let status = Status::pending(Query::by_key(1i64));
        assert!(status.cancel());

        let outcome = status.await_outcome().await;
        let err = outcome.error().unwrap();
        assert!(matches!(**err, Error::Cancelled));

        // the pipeline's late completion loses the race
        assert!(!status.complete(FindOutcome::Absent));
    }
}
