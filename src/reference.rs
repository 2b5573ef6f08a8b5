//! Query references: the live handle bridging one observable query
//! subscription to promise-based reads.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, trace};
use parking_lot::Mutex;
use serde_json::Value;
use slab::Slab;

use crate::cache::{CacheInner, SuspenseCache};
use crate::key::CacheKey;
use crate::observable::{FetchMoreOptions, ObservableQuery, Subscription};
use crate::policy::{apply_error_policy, ErrorPolicy};
use crate::promise::{PromiseSettler, QueryPromise};
use crate::result::QuerySnapshot;
use crate::QueryError;

/// Grace period between the consumer count reaching zero and teardown.
///
/// Bridges the host framework's habit of unmounting and immediately
/// remounting the same logical subscriber. Fixed, not per-call
/// configurable.
pub const DISPOSE_DEBOUNCE: Duration = Duration::from_millis(10);

type Listener = Arc<dyn Fn(QueryPromise) + Send + Sync>;

enum FetchOp {
    Refetch(Option<Value>),
    FetchMore(FetchMoreOptions),
}

struct RefState {
    /// The most recent snapshot's promise. Replaced, never rolled back.
    promise: QueryPromise,
    /// Settlers of every not-yet-settled promise handed out, the current
    /// one included. A promise given to a caller must eventually settle,
    /// even after it has been superseded.
    settlers: Vec<PromiseSettler>,
    subscription: Option<Subscription>,
    ref_count: usize,
    /// Bumped on every retain/release so a stale disposal timer firing
    /// after a new retain is a provable no-op.
    generation: u64,
    disposed: bool,
}

pub(crate) struct RefInner {
    key: CacheKey,
    serialized: String,
    observable: Arc<dyn ObservableQuery>,
    policy: ErrorPolicy,
    cache: Weak<CacheInner>,
    state: Mutex<RefState>,
    listeners: Mutex<Slab<Listener>>,
}

/// A live query reference.
///
/// Owns exactly one observable query subscription for its whole lifetime;
/// refetch and pagination reuse it. This is cheap to clone: all data is
/// behind `Arc`, and clones share state.
#[derive(Clone)]
pub struct QueryRef {
    inner: Arc<RefInner>,
}

impl QueryRef {
    /// Create a reference around an already-started observable query.
    ///
    /// Subscribes immediately. If the observable already has a settled
    /// current result, the reference starts settled; otherwise its promise
    /// is pending until the first emission.
    pub fn new(
        key: CacheKey,
        observable: Arc<dyn ObservableQuery>,
        policy: ErrorPolicy,
        cache: &SuspenseCache,
    ) -> Self {
        let (promise, settler) = QueryPromise::pending();
        let serialized = key.serialize();
        let inner = Arc::new(RefInner {
            key,
            serialized,
            observable,
            policy,
            cache: cache.inner_weak(),
            state: Mutex::new(RefState {
                promise,
                settlers: vec![settler],
                subscription: None,
                ref_count: 0,
                generation: 0,
                disposed: false,
            }),
            listeners: Mutex::new(Slab::new()),
        });
        RefInner::attach(&inner);
        if let Some(snapshot) = inner.observable.current() {
            if !snapshot.network_status.is_in_flight() {
                RefInner::handle_event(&inner, Ok(snapshot));
            }
        }
        debug!("created query reference for {}", inner.serialized);
        Self { inner }
    }

    /// The cache key this reference was created for.
    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    /// The serialized form of the key, as stored in the suspense cache.
    pub fn serialized_key(&self) -> &str {
        &self.inner.serialized
    }

    /// The error policy in effect for this reference.
    pub fn policy(&self) -> ErrorPolicy {
        self.inner.policy
    }

    /// The current promise, always the most recent snapshot.
    pub fn promise(&self) -> QueryPromise {
        self.inner.state.lock().promise.clone()
    }

    /// Identity comparison: true iff both handles share the same
    /// underlying reference.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True once the subscription has been torn down.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// The number of live retain guards.
    pub fn ref_count(&self) -> usize {
        self.inner.state.lock().ref_count
    }

    /// Register consumer interest. Cancels any pending disposal.
    ///
    /// Dropping the guard releases the interest; when the count reaches
    /// zero the reference is torn down after [`DISPOSE_DEBOUNCE`] elapses
    /// with no new retain.
    pub fn retain(&self) -> RetainGuard {
        let mut state = self.inner.state.lock();
        state.ref_count += 1;
        state.generation = state.generation.wrapping_add(1);
        trace!(
            "retained {} (count {})",
            self.inner.serialized,
            state.ref_count
        );
        drop(state);
        RetainGuard {
            reference: self.clone(),
        }
    }

    /// Register a callback invoked with the new promise on every
    /// replacement. The promise swap is always visible before the callback
    /// runs. Dropping the guard unregisters.
    pub fn listen(&self, callback: impl Fn(QueryPromise) + Send + Sync + 'static) -> ListenerGuard {
        let slot = self.inner.listeners.lock().insert(Arc::new(callback));
        ListenerGuard {
            inner: Arc::downgrade(&self.inner),
            slot,
        }
    }

    /// Re-execute the query, optionally with new variables.
    ///
    /// Synchronously replaces the current promise with a fresh pending one
    /// and notifies listeners, so readers suspend again before the network
    /// operation completes. Awaiting the returned promise yields the final
    /// snapshot.
    pub fn refetch(&self, variables: Option<Value>) -> QueryPromise {
        self.start_fetch(FetchOp::Refetch(variables))
    }

    /// Fetch an incremental page through the observable's own merge
    /// policy. Same promise-replacement contract as [`QueryRef::refetch`].
    pub fn fetch_more(&self, options: FetchMoreOptions) -> QueryPromise {
        self.start_fetch(FetchOp::FetchMore(options))
    }

    /// Re-subscribe a disposed reference to its own observable and put it
    /// back into the cache, unless a newer live reference has since taken
    /// the key (the newer one stays registered; this one keeps serving its
    /// existing readers).
    ///
    /// Recovers the debounce-then-dispose race where a slow unmount/remount
    /// exceeded the grace window. Existing settled data is reused; nothing
    /// is refetched. No-op on a live reference.
    pub fn reinitialize(&self) {
        {
            let mut state = self.inner.state.lock();
            if !state.disposed {
                return;
            }
            state.disposed = false;
            state.generation = state.generation.wrapping_add(1);
        }
        RefInner::attach(&self.inner);
        if let Some(cache) = self.inner.cache.upgrade() {
            cache.insert_if_vacant(self.inner.serialized.clone(), self.clone());
        }
        debug!("reinitialized query reference for {}", self.inner.serialized);
    }

    fn start_fetch(&self, op: FetchOp) -> QueryPromise {
        let (promise, settler) = QueryPromise::pending();
        {
            let mut state = self.inner.state.lock();
            state.promise = promise.clone();
            state.settlers.push(settler);
        }
        // Swap first, then notify: a listener must never observe the old
        // promise after being told about the new one.
        self.inner.notify(&promise);

        let inner = self.inner.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let event = match op {
                        FetchOp::Refetch(variables) => inner.observable.refetch(variables).await,
                        FetchOp::FetchMore(options) => inner.observable.fetch_more(options).await,
                    };
                    RefInner::handle_event(&inner, event);
                });
            }
            Err(_) => {
                RefInner::handle_event(
                    &inner,
                    Err(QueryError::transport(anyhow::anyhow!(
                        "refetch requires a tokio runtime"
                    ))),
                );
            }
        }
        promise
    }

    fn release(&self) {
        let generation = {
            let mut state = self.inner.state.lock();
            state.ref_count = state.ref_count.saturating_sub(1);
            trace!(
                "released {} (count {})",
                self.inner.serialized,
                state.ref_count
            );
            if state.ref_count > 0 || state.disposed {
                return;
            }
            state.generation = state.generation.wrapping_add(1);
            state.generation
        };
        let weak = Arc::downgrade(&self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(DISPOSE_DEBOUNCE).await;
                    if let Some(inner) = weak.upgrade() {
                        RefInner::try_dispose(&inner, generation);
                    }
                });
            }
            // No runtime to debounce on; tear down immediately.
            Err(_) => RefInner::try_dispose(&self.inner, generation),
        }
    }
}

impl std::fmt::Debug for QueryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("QueryRef")
            .field("key", &self.inner.serialized)
            .field("ref_count", &state.ref_count)
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl RefInner {
    /// Subscribe to the observable, routing emissions into
    /// [`RefInner::handle_event`]. The callback holds only a weak pointer
    /// so a dropped reference does not linger in the observable.
    fn attach(inner: &Arc<RefInner>) {
        let weak = Arc::downgrade(inner);
        let subscription = inner.observable.subscribe(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                RefInner::handle_event(&inner, event);
            }
        }));
        inner.state.lock().subscription = Some(subscription);
    }

    /// Apply one emission.
    ///
    /// While any handed-out promise is still pending, the emission settles
    /// all of them in place (promise identity is preserved for the current
    /// one). Once everything is settled, a later emission replaces the
    /// current promise with a fresh settled one and notifies listeners.
    fn handle_event(inner: &Arc<RefInner>, event: Result<QuerySnapshot, QueryError>) {
        let settlement = match event {
            Ok(snapshot) => apply_error_policy(inner.policy, snapshot),
            Err(err) => Err(err),
        };

        let mut state = inner.state.lock();
        if state.settlers.is_empty() {
            let fresh = QueryPromise::settled(settlement);
            state.promise = fresh.clone();
            drop(state);
            inner.notify(&fresh);
        } else {
            let settlers = std::mem::take(&mut state.settlers);
            drop(state);
            for settler in settlers {
                settler.settle(settlement.clone());
            }
        }
    }

    fn notify(&self, promise: &QueryPromise) {
        let callbacks: Vec<Listener> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for callback in callbacks {
            callback(promise.clone());
        }
    }

    fn try_dispose(inner: &Arc<RefInner>, generation: u64) {
        let subscription = {
            let mut state = inner.state.lock();
            if state.disposed || state.ref_count > 0 || state.generation != generation {
                return;
            }
            state.disposed = true;
            state.subscription.take()
        };
        drop(subscription);
        if let Some(cache) = inner.cache.upgrade() {
            cache.evict_serialized(&inner.serialized);
        }
        debug!("disposed query reference for {}", inner.serialized);
    }
}

/// RAII consumer interest in a [`QueryRef`]. Drop releases it.
pub struct RetainGuard {
    reference: QueryRef,
}

impl RetainGuard {
    /// The retained reference.
    pub fn reference(&self) -> &QueryRef {
        &self.reference
    }
}

impl Drop for RetainGuard {
    fn drop(&mut self) {
        self.reference.release();
    }
}

/// RAII listener registration on a [`QueryRef`]. Drop unregisters.
pub struct ListenerGuard {
    inner: Weak<RefInner>,
    slot: usize,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().try_remove(self.slot);
        }
    }
}
