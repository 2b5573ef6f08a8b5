//! Result snapshot data model.
//!
//! A [`QuerySnapshot`] is what the observable query emits: raw data plus any
//! GraphQL errors and the network status of the execution that produced it.
//! A [`ReadResult`] is the post-error-policy view handed to readers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::QueryError;

/// Network status of an observable query execution.
///
/// The discriminant values match the wire-level constants of the original
/// protocol; use [`NetworkStatus::as_u8`] where the number is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum NetworkStatus {
    /// The first request for this query is in flight.
    #[default]
    Loading = 1,
    /// A request triggered by a variables change is in flight.
    SetVariables = 2,
    /// A pagination request is in flight.
    FetchMore = 3,
    /// A refetch request is in flight.
    Refetch = 4,
    /// The query has data and no request is in flight.
    Ready = 7,
    /// The query failed.
    Error = 8,
}

impl NetworkStatus {
    /// Numeric form of this status.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true while any network request for the query is in flight.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            NetworkStatus::Loading
                | NetworkStatus::SetVariables
                | NetworkStatus::FetchMore
                | NetworkStatus::Refetch
        )
    }
}

/// A single GraphQL error returned alongside (possibly partial) data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlError {
    /// Human-readable error message.
    pub message: String,
    /// Path to the response field the error applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Server-defined extensions, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQlError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }
}

/// One result snapshot emitted by an observable query.
///
/// Not owned by this crate; only consumed and wrapped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySnapshot {
    /// Response data, possibly partial, possibly absent.
    pub data: Option<Value>,
    /// GraphQL errors returned alongside the data.
    pub errors: Vec<GraphQlError>,
    /// Network status of the execution that produced this snapshot.
    pub network_status: NetworkStatus,
}

impl QuerySnapshot {
    /// A ready snapshot carrying only data.
    pub fn ready(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            network_status: NetworkStatus::Ready,
        }
    }
}

/// The view a reader receives once a promise settles with a value.
///
/// Which of `data`/`error` are populated depends on the error policy in
/// effect; see [`apply_error_policy`](crate::apply_error_policy).
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// Response data, possibly partial.
    pub data: Option<Value>,
    /// The query's error, when the policy surfaces it alongside data.
    pub error: Option<QueryError>,
    /// Network status at settlement.
    pub network_status: NetworkStatus,
}
