#![deny(missing_docs)]

//! Suspense-Query: keyed query references bridging push-based observable
//! GraphQL executions to pull-based suspending readers.
//!
//! A suspension host signals "not ready" by suspending on a pending
//! promise and resumes once it settles. This crate owns the layer in
//! between: a per-client registry of live query references, each wrapping
//! exactly one observable query subscription and exposing its current and
//! future results as a stable, replaceable [`QueryPromise`].
//!
//! # Key Features
//!
//! - **Promise identity stability**: the same logical read returns the
//!   identical promise object across passes, so an already-settled result
//!   is never mistaken for a fresh suspension
//! - **Liveness**: every emission (cache write, refetch, pagination)
//!   settles or replaces the promise and wakes every consumer
//! - **Reference counting with debounced teardown**: transient
//!   unmount/remount churn never tears down a subscription
//! - **Three error policies**: reject, surface alongside data, or discard
//!
//! # Example
//!
//! ```ignore
//! use suspense_query::QueryClient;
//!
//! let client = QueryClient::new();
//! let handle = client.handle("GetCharacter", start_character_query);
//!
//! handle.load(Some(json!({"id": "1"})));
//! let reader = handle.reader().unwrap();
//! let result = reader.read().await?; // suspends until the first snapshot
//!
//! handle.refetch(None); // readers suspend again until settlement
//! ```
//!
//! Execution itself is external: anything implementing
//! [`ObservableQuery`] can sit behind a reference. True request
//! cancellation does not exist at this layer; a superseded promise is
//! abandoned, not aborted.

mod bridge;
mod cache;
mod error;
mod handle;
mod key;
mod observable;
mod policy;
mod promise;
mod reference;
mod result;

pub use bridge::{PromiseCache, SuspenseReader};
pub use cache::SuspenseCache;
pub use error::QueryError;
pub use handle::{QueryClient, QueryHandle, QueryStarter};
pub use key::{canonical_variables, CacheKey};
pub use observable::{FetchMoreOptions, ObservableQuery, SnapshotListener, Subscription};
pub use policy::{apply_error_policy, ErrorPolicy};
pub use promise::{PromiseSettler, QueryPromise, Settlement};
pub use reference::{ListenerGuard, QueryRef, RetainGuard, DISPOSE_DEBOUNCE};
pub use result::{GraphQlError, NetworkStatus, QuerySnapshot, ReadResult};
