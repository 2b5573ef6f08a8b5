//! The shared two-state promise used as the suspension signal.
//!
//! A [`QueryPromise`] is either `Pending` or `Settled` with a final
//! `Result<ReadResult, QueryError>`. It can be cloned cheaply and awaited
//! from any number of readers; settlement happens exactly once, from the
//! outside, through the paired [`PromiseSettler`]. Readers that need to
//! decide "suspend or render" without awaiting use [`QueryPromise::peek`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::result::ReadResult;
use crate::QueryError;

/// The final value of a settled promise.
pub type Settlement = Result<ReadResult, QueryError>;

enum PromiseState {
    Pending { wakers: Vec<Waker> },
    Settled(Settlement),
}

struct PromiseInner {
    state: Mutex<PromiseState>,
}

/// A cheaply cloneable, externally settled promise of one query result.
///
/// Promise identity (via [`QueryPromise::ptr_eq`]) is meaningful: the host
/// framework treats a different promise object as a new suspension, so the
/// same logical read must hand back the identical promise object.
#[derive(Clone)]
pub struct QueryPromise {
    inner: Arc<PromiseInner>,
}

impl QueryPromise {
    /// Create a pending promise together with its settler.
    pub fn pending() -> (Self, PromiseSettler) {
        let inner = Arc::new(PromiseInner {
            state: Mutex::new(PromiseState::Pending { wakers: Vec::new() }),
        });
        (
            Self {
                inner: inner.clone(),
            },
            PromiseSettler { inner },
        )
    }

    /// Create a promise that is already settled.
    pub fn settled(settlement: Settlement) -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                state: Mutex::new(PromiseState::Settled(settlement)),
            }),
        }
    }

    /// Returns true once the promise has settled.
    pub fn is_settled(&self) -> bool {
        matches!(&*self.inner.state.lock(), PromiseState::Settled(_))
    }

    /// Non-blocking read of the settlement, if any.
    pub fn peek(&self) -> Option<Settlement> {
        match &*self.inner.state.lock() {
            PromiseState::Settled(settlement) => Some(settlement.clone()),
            PromiseState::Pending { .. } => None,
        }
    }

    /// Identity comparison: true iff both handles refer to the same
    /// underlying promise object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Future for QueryPromise {
    type Output = Settlement;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.state.lock();
        match &mut *state {
            PromiseState::Settled(settlement) => Poll::Ready(settlement.clone()),
            PromiseState::Pending { wakers } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl std::fmt::Debug for QueryPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.inner.state.lock() {
            PromiseState::Pending { wakers } => {
                write!(f, "QueryPromise::Pending({} wakers)", wakers.len())
            }
            PromiseState::Settled(Ok(_)) => write!(f, "QueryPromise::Settled(Ok)"),
            PromiseState::Settled(Err(e)) => write!(f, "QueryPromise::Settled(Err({e}))"),
        }
    }
}

/// The settle-once half of a pending [`QueryPromise`].
pub struct PromiseSettler {
    inner: Arc<PromiseInner>,
}

impl PromiseSettler {
    /// Settle the promise and wake every registered waker.
    ///
    /// Returns false if the promise had already settled; a settled promise
    /// never un-settles and later settlements are no-ops.
    pub fn settle(&self, settlement: Settlement) -> bool {
        let wakers = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                PromiseState::Settled(_) => return false,
                PromiseState::Pending { wakers } => {
                    let wakers = std::mem::take(wakers);
                    *state = PromiseState::Settled(settlement);
                    wakers
                }
            }
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// The promise this settler belongs to.
    pub fn promise(&self) -> QueryPromise {
        QueryPromise {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::NetworkStatus;
    use serde_json::json;

    fn ok_result(data: serde_json::Value) -> Settlement {
        Ok(ReadResult {
            data: Some(data),
            error: None,
            network_status: NetworkStatus::Ready,
        })
    }

    #[test]
    fn test_peek_pending_then_settled() {
        let (promise, settler) = QueryPromise::pending();
        assert!(!promise.is_settled());
        assert!(promise.peek().is_none());

        assert!(settler.settle(ok_result(json!(1))));
        let view = promise.peek().unwrap().unwrap();
        assert_eq!(view.data, Some(json!(1)));
    }

    #[test]
    fn test_settle_is_once_only() {
        let (promise, settler) = QueryPromise::pending();
        assert!(settler.settle(ok_result(json!("first"))));
        assert!(!settler.settle(ok_result(json!("second"))));
        let view = promise.peek().unwrap().unwrap();
        assert_eq!(view.data, Some(json!("first")));
    }

    #[test]
    fn test_ptr_eq_tracks_identity() {
        let (a, _s) = QueryPromise::pending();
        let b = a.clone();
        let (c, _t) = QueryPromise::pending();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[tokio::test]
    async fn test_await_wakes_on_settle() {
        let (promise, settler) = QueryPromise::pending();
        let waiter = tokio::spawn(promise.clone());
        tokio::task::yield_now().await;
        settler.settle(ok_result(json!({"ok": true})));
        let view = waiter.await.unwrap().unwrap();
        assert_eq!(view.data, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_await_already_settled() {
        let promise = QueryPromise::settled(ok_result(json!(7)));
        let view = promise.clone().await.unwrap();
        assert_eq!(view.data, Some(json!(7)));
    }
}
