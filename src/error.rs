//! Error types for query settlement.

use std::sync::Arc;

use crate::result::GraphQlError;

/// Errors a query promise can reject with.
///
/// GraphQL result errors arrive alongside (possibly partial) data and are
/// subject to the reference's error policy. Transport errors carry no data
/// and always reject regardless of policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The execution completed but the response carried GraphQL errors.
    #[error("query completed with {} GraphQL error(s)", .errors.len())]
    GraphQl {
        /// The errors returned in the response.
        errors: Vec<GraphQlError>,
    },

    /// The execution failed before producing any data.
    ///
    /// Wraps the underlying error so callers can downcast to the concrete
    /// transport failure type.
    #[error("transport error: {0}")]
    Transport(Arc<anyhow::Error>),
}

impl QueryError {
    /// Wrap a transport-level failure.
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        QueryError::Transport(Arc::new(err.into()))
    }

    /// The GraphQL errors, if this is a `GraphQl` variant.
    pub fn graphql_errors(&self) -> Option<&[GraphQlError]> {
        match self {
            QueryError::GraphQl { errors } => Some(errors),
            _ => None,
        }
    }

    /// The wrapped transport error, if this is a `Transport` variant.
    pub fn transport_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            QueryError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the transport error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.transport_error().and_then(|e| e.downcast_ref::<E>())
    }
}

impl From<Vec<GraphQlError>> for QueryError {
    fn from(errors: Vec<GraphQlError>) -> Self {
        QueryError::GraphQl { errors }
    }
}
