//! Error policies and their application to result snapshots.

use crate::result::{NetworkStatus, QuerySnapshot, ReadResult};
use crate::QueryError;

/// Governs how GraphQL result errors surface to readers.
///
/// Transport failures with no data are unaffected by the policy and always
/// reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorPolicy {
    /// Any GraphQL error rejects the promise (the default).
    #[default]
    None,
    /// GraphQL errors are discarded entirely; the promise resolves with
    /// whatever data is present and no error. Discarded errors must not
    /// leak, not even through logging at this layer.
    Ignore,
    /// The promise resolves with both the (possibly partial) data and the
    /// error, network status `Error`.
    All,
}

/// Apply an error policy to a snapshot, producing the settlement value.
///
/// Pure: the same `(policy, snapshot)` pair always produces the same
/// outcome. This is the single place the three policies diverge.
pub fn apply_error_policy(
    policy: ErrorPolicy,
    snapshot: QuerySnapshot,
) -> Result<ReadResult, QueryError> {
    if snapshot.errors.is_empty() {
        return Ok(ReadResult {
            data: snapshot.data,
            error: None,
            network_status: snapshot.network_status,
        });
    }
    match policy {
        ErrorPolicy::None => Err(QueryError::GraphQl {
            errors: snapshot.errors,
        }),
        ErrorPolicy::Ignore => Ok(ReadResult {
            data: snapshot.data,
            error: None,
            network_status: NetworkStatus::Ready,
        }),
        ErrorPolicy::All => Ok(ReadResult {
            data: snapshot.data,
            error: Some(QueryError::GraphQl {
                errors: snapshot.errors,
            }),
            network_status: NetworkStatus::Error,
        }),
    }
}
