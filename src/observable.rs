//! The observable query collaborator interface.
//!
//! Execution itself (cache normalization, network fetching, merge/read
//! policies) lives behind this trait. The reference layer only needs a
//! way to observe snapshots and to trigger refetch/pagination on the one
//! execution it owns.

use async_trait::async_trait;
use serde_json::Value;

use crate::result::QuerySnapshot;
use crate::QueryError;

/// Callback receiving each emission of an observable query.
///
/// `Ok` carries a result snapshot (which may itself contain GraphQL
/// errors); `Err` is a transport-level failure with no data.
pub type SnapshotListener = Box<dyn Fn(Result<QuerySnapshot, QueryError>) + Send + Sync>;

/// Options for a pagination request.
#[derive(Debug, Clone, Default)]
pub struct FetchMoreOptions {
    /// Variables overriding the original ones for the incremental request.
    pub variables: Option<Value>,
}

/// A live subscription to an observable query.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap an unsubscribe action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Explicitly unsubscribe.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A long-lived query execution that re-emits as state changes.
///
/// One implementation instance corresponds to one execution; `refetch` and
/// `fetch_more` re-drive that same execution rather than starting a new
/// one. Implementations deliver the final snapshot of a refetch/fetch_more
/// through the returned future; they may additionally emit it on the
/// subscription (the reference layer tolerates both).
#[async_trait]
pub trait ObservableQuery: Send + Sync {
    /// Subscribe to future emissions.
    fn subscribe(&self, listener: SnapshotListener) -> Subscription;

    /// The most recent snapshot, if the execution has produced one.
    fn current(&self) -> Option<QuerySnapshot>;

    /// Re-execute the query, optionally with new variables.
    async fn refetch(&self, variables: Option<Value>) -> Result<QuerySnapshot, QueryError>;

    /// Fetch an incremental page and merge it per the execution's own
    /// merge policy.
    async fn fetch_more(&self, options: FetchMoreOptions) -> Result<QuerySnapshot, QueryError>;
}
