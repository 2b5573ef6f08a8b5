//! Tests for the suspense cache registry and cache key identity.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use suspense_query::{CacheKey, ErrorPolicy, QueryRef, SuspenseCache};

use common::{as_observable, character_snapshot, MockObservable};

fn make_ref(cache: &SuspenseCache, key: &CacheKey, mock: &Arc<MockObservable>) -> QueryRef {
    QueryRef::new(key.clone(), as_observable(mock), ErrorPolicy::None, cache)
}

// ============================================================================
// Key identity
// ============================================================================

#[test]
fn test_value_equal_keys_share_one_reference() {
    let cache = SuspenseCache::new();
    let mock = MockObservable::new();
    let a = CacheKey::new("GetCharacter", Some(&json!({"id": "1", "lang": "en"})), &[]);
    let b = CacheKey::new("GetCharacter", Some(&json!({"lang": "en", "id": "1"})), &[]);

    let first = cache.get_or_create(&a, || make_ref(&cache, &a, &mock));
    let second = cache.get_or_create(&b, || make_ref(&cache, &b, &mock));

    assert!(first.ptr_eq(&second));
    assert_eq!(cache.len(), 1);
    assert_eq!(mock.subscriptions(), 1);
}

#[test]
fn test_distinct_variables_get_distinct_references() {
    let cache = SuspenseCache::new();
    let mock = MockObservable::new();
    let a = CacheKey::new("GetCharacter", Some(&json!({"id": "1"})), &[]);
    let b = CacheKey::new("GetCharacter", Some(&json!({"id": "2"})), &[]);

    let first = cache.get_or_create(&a, || make_ref(&cache, &a, &mock));
    let second = cache.get_or_create(&b, || make_ref(&cache, &b, &mock));

    assert!(!first.ptr_eq(&second));
    assert_eq!(cache.len(), 2);
}

// ============================================================================
// Get-or-create semantics
// ============================================================================

#[test]
fn test_factory_runs_at_most_once_per_key() {
    let cache = SuspenseCache::new();
    let mock = MockObservable::new();
    let key = CacheKey::new("Q", None, &[]);
    let created = AtomicUsize::new(0);

    for _ in 0..3 {
        cache.get_or_create(&key, || {
            created.fetch_add(1, Ordering::SeqCst);
            make_ref(&cache, &key, &mock)
        });
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(mock.subscriptions(), 1);
}

#[test]
fn test_evict_removes_mapping() {
    let cache = SuspenseCache::new();
    let mock = MockObservable::new();
    let key = CacheKey::new("Q", None, &[]);

    cache.get_or_create(&key, || make_ref(&cache, &key, &mock));
    assert!(cache.contains(&key));

    cache.evict(&key);
    assert!(!cache.contains(&key));
    assert!(cache.is_empty());
}

#[test]
fn test_disposed_entry_is_replaced() {
    let cache = SuspenseCache::new();
    let mock = MockObservable::new();
    let key = CacheKey::new("Q", None, &[]);

    let first = cache.get_or_create(&key, || make_ref(&cache, &key, &mock));
    mock.emit(character_snapshot());
    // No runtime here, so dropping the last guard disposes immediately.
    drop(first.retain());
    assert!(first.is_disposed());

    let second = cache.get_or_create(&key, || make_ref(&cache, &key, &mock));
    assert!(!second.ptr_eq(&first));
    assert!(!second.is_disposed());
    assert_eq!(mock.subscriptions(), 2);
}

#[test]
fn test_caches_are_isolated_per_instance() {
    let key = CacheKey::new("Q", None, &[]);
    let mock_a = MockObservable::new();
    let mock_b = MockObservable::new();
    let cache_a = SuspenseCache::new();
    let cache_b = SuspenseCache::new();

    let a = cache_a.get_or_create(&key, || make_ref(&cache_a, &key, &mock_a));
    let b = cache_b.get_or_create(&key, || make_ref(&cache_b, &key, &mock_b));

    assert!(!a.ptr_eq(&b));
    assert_eq!(cache_a.len(), 1);
    assert_eq!(cache_b.len(), 1);
}
