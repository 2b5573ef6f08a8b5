//! Shared mock observable query for integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use slab::Slab;

use suspense_query::{
    FetchMoreOptions, ObservableQuery, QueryError, QuerySnapshot, SnapshotListener, Subscription,
};

/// Scriptable observable query with subscription-count spies.
///
/// Emissions are pushed through `emit`/`emit_error`. Refetch and fetch_more
/// pop queued results; with nothing queued they fall back to the current
/// snapshot, or pend forever when there is none.
pub struct MockObservable {
    listeners: Arc<Mutex<Slab<SnapshotListener>>>,
    current: Mutex<Option<QuerySnapshot>>,
    subscribe_count: AtomicUsize,
    refetch_count: AtomicUsize,
    fetch_more_count: AtomicUsize,
    refetch_results: Mutex<VecDeque<Result<QuerySnapshot, QueryError>>>,
    fetch_more_results: Mutex<VecDeque<Result<QuerySnapshot, QueryError>>>,
}

impl MockObservable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Arc::new(Mutex::new(Slab::new())),
            current: Mutex::new(None),
            subscribe_count: AtomicUsize::new(0),
            refetch_count: AtomicUsize::new(0),
            fetch_more_count: AtomicUsize::new(0),
            refetch_results: Mutex::new(VecDeque::new()),
            fetch_more_results: Mutex::new(VecDeque::new()),
        })
    }

    /// Emit a snapshot to every subscriber and record it as current.
    pub fn emit(&self, snapshot: QuerySnapshot) {
        *self.current.lock() = Some(snapshot.clone());
        let listeners = self.listeners.lock();
        for (_, listener) in listeners.iter() {
            listener(Ok(snapshot.clone()));
        }
    }

    /// Emit a transport error to every subscriber.
    pub fn emit_error(&self, err: QueryError) {
        let listeners = self.listeners.lock();
        for (_, listener) in listeners.iter() {
            listener(Err(err.clone()));
        }
    }

    pub fn queue_refetch(&self, result: Result<QuerySnapshot, QueryError>) {
        self.refetch_results.lock().push_back(result);
    }

    #[allow(dead_code)]
    pub fn queue_fetch_more(&self, result: Result<QuerySnapshot, QueryError>) {
        self.fetch_more_results.lock().push_back(result);
    }

    /// Total number of `subscribe` calls ever made.
    pub fn subscriptions(&self) -> usize {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of currently attached subscribers.
    pub fn active_subscriptions(&self) -> usize {
        self.listeners.lock().len()
    }

    #[allow(dead_code)]
    pub fn refetches(&self) -> usize {
        self.refetch_count.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn fetch_mores(&self) -> usize {
        self.fetch_more_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservableQuery for MockObservable {
    fn subscribe(&self, listener: SnapshotListener) -> Subscription {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        let slot = self.listeners.lock().insert(listener);
        let listeners = self.listeners.clone();
        Subscription::new(move || {
            listeners.lock().try_remove(slot);
        })
    }

    fn current(&self) -> Option<QuerySnapshot> {
        self.current.lock().clone()
    }

    async fn refetch(&self, _variables: Option<Value>) -> Result<QuerySnapshot, QueryError> {
        self.refetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.refetch_results.lock().pop_front() {
            return result;
        }
        // Drop the guard before any await point so the future stays Send.
        let current = self.current.lock().clone();
        match current {
            Some(snapshot) => Ok(snapshot),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn fetch_more(&self, _options: FetchMoreOptions) -> Result<QuerySnapshot, QueryError> {
        self.fetch_more_count.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.fetch_more_results.lock().pop_front() {
            return result;
        }
        let current = self.current.lock().clone();
        match current {
            Some(snapshot) => Ok(snapshot),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Coerce a mock into the trait object the reference layer consumes.
pub fn as_observable(mock: &Arc<MockObservable>) -> Arc<dyn ObservableQuery> {
    mock.clone()
}

#[allow(dead_code)]
pub fn character_snapshot() -> QuerySnapshot {
    QuerySnapshot::ready(json!({
        "character": {"id": "1", "name": "Spider-Man"}
    }))
}
