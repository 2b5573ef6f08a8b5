//! The interactive entry point: imperative load, refetch, and pagination.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::bridge::{PromiseCache, SuspenseReader};
use crate::cache::SuspenseCache;
use crate::key::CacheKey;
use crate::observable::{FetchMoreOptions, ObservableQuery};
use crate::policy::ErrorPolicy;
use crate::promise::QueryPromise;
use crate::reference::{QueryRef, RetainGuard};

/// Starts one observable query execution for a set of variables.
///
/// Invoked by [`QueryHandle::load`] only when no live reference exists for
/// the computed cache key.
pub trait QueryStarter: Send + Sync {
    /// Begin executing the query with `variables`.
    fn start(&self, variables: Option<&Value>) -> Arc<dyn ObservableQuery>;
}

impl<F> QueryStarter for F
where
    F: Fn(Option<&Value>) -> Arc<dyn ObservableQuery> + Send + Sync,
{
    fn start(&self, variables: Option<&Value>) -> Arc<dyn ObservableQuery> {
        self(variables)
    }
}

struct Loaded {
    reference: QueryRef,
    _retain: RetainGuard,
}

/// Owning context for one client/session: the suspense cache and the
/// promise cache every handle and reader of that client shares.
///
/// Never a global: construct one per top-level client so independent
/// instances coexist (and can be isolated in tests).
#[derive(Clone, Default)]
pub struct QueryClient {
    cache: SuspenseCache,
    promises: PromiseCache,
}

impl QueryClient {
    /// Create a client with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// The client's suspense cache.
    pub fn cache(&self) -> &SuspenseCache {
        &self.cache
    }

    /// The client's shared promise cache.
    pub fn promises(&self) -> &PromiseCache {
        &self.promises
    }

    /// Create a handle for `operation` backed by `starter`.
    pub fn handle(
        &self,
        operation: impl Into<String>,
        starter: impl QueryStarter + 'static,
    ) -> QueryHandle {
        QueryHandle {
            operation: operation.into(),
            extra_keys: Vec::new(),
            policy: ErrorPolicy::default(),
            cache: self.cache.clone(),
            promises: self.promises.clone(),
            starter: Arc::new(starter),
            loaded: Mutex::new(None),
        }
    }
}

/// Imperative access to one query: `load`, then `refetch`/`fetch_more`.
///
/// The paired read side is a [`SuspenseReader`] over the loaded reference.
pub struct QueryHandle {
    operation: String,
    extra_keys: Vec<String>,
    policy: ErrorPolicy,
    cache: SuspenseCache,
    promises: PromiseCache,
    starter: Arc<dyn QueryStarter>,
    loaded: Mutex<Option<Loaded>>,
}

impl QueryHandle {
    /// Set the error policy for references this handle creates.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Append an extra opaque cache key part (e.g. a fetch-policy
    /// discriminator).
    pub fn with_key_part(mut self, part: impl Into<String>) -> Self {
        self.extra_keys.push(part.into());
        self
    }

    /// Load the query for `variables`: compute the cache key, get or
    /// create the reference, and retain it. Fire-and-forget; observe state
    /// through [`QueryHandle::reader`] or [`QueryHandle::reference`].
    ///
    /// Loading the same key twice reuses the existing reference and its
    /// subscription.
    pub fn load(&self, variables: Option<Value>) {
        let key = CacheKey::new(self.operation.clone(), variables.as_ref(), &self.extra_keys);
        let reference = self.cache.get_or_create(&key, || {
            QueryRef::new(
                key.clone(),
                self.starter.start(variables.as_ref()),
                self.policy,
                &self.cache,
            )
        });
        let retain = reference.retain();
        *self.loaded.lock() = Some(Loaded {
            reference,
            _retain: retain,
        });
    }

    /// The loaded reference, or `None` before the first `load` (and after
    /// `reset`).
    pub fn reference(&self) -> Option<QueryRef> {
        self.loaded.lock().as_ref().map(|l| l.reference.clone())
    }

    /// A read adapter over the loaded reference.
    pub fn reader(&self) -> Option<SuspenseReader> {
        self.reference()
            .map(|r| SuspenseReader::new(r, self.promises.clone()))
    }

    /// Refetch through the loaded reference, publishing the new promise to
    /// the shared promise cache so the read side picks it up directly.
    ///
    /// # Panics
    ///
    /// Panics if the query has not been loaded.
    pub fn refetch(&self, variables: Option<Value>) -> QueryPromise {
        // Clone the reference out: listeners run synchronously inside
        // refetch and must not observe the handle locked.
        let reference = self.loaded.lock().as_ref().map(|l| l.reference.clone());
        let Some(reference) = reference else {
            panic!("query has not been loaded");
        };
        let promise = reference.refetch(variables);
        self.promises
            .insert(reference.serialized_key().to_string(), promise.clone());
        promise
    }

    /// Paginate through the loaded reference; same contract as
    /// [`QueryHandle::refetch`].
    ///
    /// # Panics
    ///
    /// Panics if the query has not been loaded.
    pub fn fetch_more(&self, options: FetchMoreOptions) -> QueryPromise {
        let reference = self.loaded.lock().as_ref().map(|l| l.reference.clone());
        let Some(reference) = reference else {
            panic!("query has not been loaded");
        };
        let promise = reference.fetch_more(options);
        self.promises
            .insert(reference.serialized_key().to_string(), promise.clone());
        promise
    }

    /// Release the handle's interest and clear the loaded reference.
    ///
    /// The reference itself survives until every other consumer detaches
    /// and the debounce window elapses.
    pub fn reset(&self) {
        *self.loaded.lock() = None;
    }
}
