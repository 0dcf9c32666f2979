//! Error types for backend queries

use std::time::Duration;

/// Errors that can occur while evaluating a single query
///
/// A query error never aborts a collection cycle; the collector records the
/// affected (entity, metric) pair as absent.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The cycle deadline passed before the backend answered
    #[error("query deadline exceeded after {0:?}")]
    Timeout(Duration),

    /// Connection refused, TLS failure, reset, ...
    #[error("failed to reach backend: {0}")]
    Transport(#[source] reqwest::Error),

    /// Backend answered with a non-success HTTP status
    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Backend reported `status: "error"` in its response body
    #[error("backend error ({kind}): {message}")]
    Backend { kind: String, message: String },

    /// Response body could not be decoded
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// Result type other than an instant vector or scalar
    #[error("unexpected result type `{0}`")]
    UnexpectedResult(String),
}
