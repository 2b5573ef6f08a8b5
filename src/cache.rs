//! The suspense cache: one live query reference per cache key.

use std::sync::{Arc, Weak};

use log::debug;
use papaya::HashMap;

use crate::key::CacheKey;
use crate::reference::QueryRef;

pub(crate) struct CacheInner {
    entries: HashMap<String, QueryRef, ahash::RandomState>,
}

impl CacheInner {
    /// Insert only when the key is vacant or its entry has been disposed.
    ///
    /// Keeps the one-live-reference-per-key invariant when a stale
    /// reference re-registers after a newer one already took the key.
    pub(crate) fn insert_if_vacant(&self, serialized: String, reference: QueryRef) {
        let pinned = self.entries.pin();
        if let Some(existing) = pinned.get(&serialized) {
            if !existing.is_disposed() {
                return;
            }
        }
        pinned.insert(serialized, reference);
    }

    pub(crate) fn evict_serialized(&self, serialized: &str) {
        let pinned = self.entries.pin();
        if pinned.remove(serialized).is_some() {
            debug!("evicted query reference for {serialized}");
        }
    }
}

/// Registry mapping serialized cache keys to live query references.
///
/// Scoped to one owning client/session value, never a global: construct
/// one per top-level client so independent instances can coexist. Cheap to
/// clone; clones share the registry.
#[derive(Clone)]
pub struct SuspenseCache {
    inner: Arc<CacheInner>,
}

impl Default for SuspenseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspenseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: HashMap::with_hasher(ahash::RandomState::new()),
            }),
        }
    }

    /// Return the live reference for `key`, or create, store, and return
    /// one via `create`.
    ///
    /// A stored reference that has since been disposed does not count as
    /// live; it is replaced by a freshly created one. `create` runs at most
    /// once per call and only when no live reference exists, so repeated
    /// calls within one synchronous pass share a single reference.
    pub fn get_or_create(&self, key: &CacheKey, create: impl FnOnce() -> QueryRef) -> QueryRef {
        let serialized = key.serialize();
        let pinned = self.inner.entries.pin();
        if let Some(existing) = pinned.get(&serialized) {
            if !existing.is_disposed() {
                return existing.clone();
            }
        }
        let reference = create();
        pinned.insert(serialized, reference.clone());
        reference
    }

    /// Look up the live reference for `key` without creating one.
    pub fn get(&self, key: &CacheKey) -> Option<QueryRef> {
        let pinned = self.inner.entries.pin();
        pinned
            .get(&key.serialize())
            .filter(|r| !r.is_disposed())
            .cloned()
    }

    /// Remove the mapping for `key`.
    ///
    /// Invoked by a reference's own disposal completion; adapters never
    /// call this directly.
    pub fn evict(&self, key: &CacheKey) {
        self.inner.evict_serialized(&key.serialize());
    }

    /// Number of stored references (disposed-but-not-yet-evicted included).
    pub fn len(&self) -> usize {
        self.inner.entries.pin().len()
    }

    /// True if the cache holds no references.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if a reference is stored under `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.entries.pin().contains_key(&key.serialize())
    }

    pub(crate) fn inner_weak(&self) -> Weak<CacheInner> {
        Arc::downgrade(&self.inner)
    }
}
