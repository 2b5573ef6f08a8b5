//! The promise/listener bridge between query references and the
//! suspension host's external-store contract.
//!
//! The host reads a "current snapshot" (here: the current promise) and
//! subscribes for change notifications. Two rules make that safe:
//!
//! 1. Reads during one synchronous pass must return the identical promise
//!    object, or the host will treat an already-settled result as still
//!    pending.
//! 2. On replacement, the new promise is written into the shared promise
//!    cache before the host's re-render trigger fires, so the next read is
//!    guaranteed to observe it.

use std::sync::Arc;

use papaya::HashMap;

use crate::promise::QueryPromise;
use crate::reference::{ListenerGuard, QueryRef, RetainGuard};
use crate::result::ReadResult;
use crate::QueryError;

/// Shared map from serialized cache key to the promise last published for
/// that key. Cheap to clone; clones share the map.
#[derive(Clone)]
pub struct PromiseCache {
    entries: Arc<HashMap<String, QueryPromise, ahash::RandomState>>,
}

impl Default for PromiseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PromiseCache {
    /// Create an empty promise cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(HashMap::with_hasher(ahash::RandomState::new())),
        }
    }

    /// The promise last published under `serialized`, if any.
    pub fn get(&self, serialized: &str) -> Option<QueryPromise> {
        self.entries.pin().get(serialized).cloned()
    }

    /// Publish `promise` under `serialized`.
    pub fn insert(&self, serialized: String, promise: QueryPromise) {
        self.entries.pin().insert(serialized, promise);
    }

    /// Drop the entry for `serialized`.
    pub fn remove(&self, serialized: &str) {
        self.entries.pin().remove(serialized);
    }
}

/// Read adapter over one [`QueryRef`] for a suspension host subscriber.
///
/// Holds consumer interest in the reference for as long as it lives, and
/// transparently reinitializes a reference whose subscription was disposed
/// while the host was between unmount and remount.
pub struct SuspenseReader {
    reference: QueryRef,
    promises: PromiseCache,
    _retain: RetainGuard,
}

impl SuspenseReader {
    /// Attach to a reference, retaining it.
    ///
    /// A disposed reference is reinitialized rather than rejected; the
    /// read side never surfaces stale-reference errors.
    pub fn new(reference: QueryRef, promises: PromiseCache) -> Self {
        reference.reinitialize();
        let retain = reference.retain();
        Self {
            reference,
            promises,
            _retain: retain,
        }
    }

    /// The reference this reader is attached to.
    pub fn reference(&self) -> &QueryRef {
        &self.reference
    }

    /// The promise the host should suspend on.
    ///
    /// Consults the shared promise cache first so repeated reads in one
    /// pass return the identical promise object, falling back to the
    /// reference's own current promise.
    pub fn current_promise(&self) -> QueryPromise {
        self.reference.reinitialize();
        self.promises
            .get(self.reference.serialized_key())
            .unwrap_or_else(|| self.reference.promise())
    }

    /// Subscribe to promise replacements.
    ///
    /// The listener writes the replacement into the promise cache and only
    /// then invokes `on_change`, so a re-render triggered by `on_change`
    /// reads the fresh promise.
    pub fn subscribe(&self, on_change: impl Fn() + Send + Sync + 'static) -> ListenerGuard {
        let promises = self.promises.clone();
        let serialized = self.reference.serialized_key().to_string();
        self.reference.listen(move |promise| {
            promises.insert(serialized.clone(), promise);
            on_change();
        })
    }

    /// Await the current promise's settlement.
    pub async fn read(&self) -> Result<ReadResult, QueryError> {
        self.current_promise().await
    }
}
