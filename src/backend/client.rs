//! Backend client trait definition
//!
//! This module defines the core `BackendClient` trait that all
//! time-series backends must implement.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::error::QueryError;

/// One element of an instant vector
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Series labels
    pub labels: BTreeMap<String, String>,

    /// Evaluation timestamp reported by the backend (unix seconds)
    pub timestamp: f64,

    /// Sample value
    pub value: f64,
}

/// Result of a single instant query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Non-empty instant vector, one sample per matching series
    Vector(Vec<Sample>),

    /// Scalar result (e.g. `scalar(...)` or a numeric literal)
    Scalar(f64),

    /// Query succeeded but matched no series
    Empty,
}

impl QueryResult {
    /// Build a result from vector samples, mapping an empty vector to `Empty`.
    pub fn from_vector(samples: Vec<Sample>) -> Self {
        if samples.is_empty() {
            QueryResult::Empty
        } else {
            QueryResult::Vector(samples)
        }
    }

    /// Value of the first vector element.
    ///
    /// Only instant vectors carry a per-entity sample; scalars and empty
    /// results yield `None`.
    pub fn first_value(&self) -> Option<f64> {
        match self {
            QueryResult::Vector(samples) => samples.first().map(|sample| sample.value),
            QueryResult::Scalar(_) | QueryResult::Empty => None,
        }
    }
}

/// Trait for time-series backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as the collector fans queries out
/// across concurrent futures.
///
/// ## Deadline
///
/// `deadline` is shared by every query of one collection cycle. Implementations
/// must give up with `QueryError::Timeout` once it has passed instead of
/// blocking the cycle.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Evaluate `query` as an instant query at `at`.
    async fn query(
        &self,
        query: &str,
        at: DateTime<Utc>,
        deadline: Instant,
    ) -> Result<QueryResult, QueryError>;
}
