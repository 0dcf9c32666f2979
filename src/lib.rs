pub mod actors;
pub mod backend;
pub mod collector;
pub mod config;
pub mod forwarder;
pub mod template;
pub mod util;
pub mod window;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a measured thing (e.g. a container name).
pub type EntityId = String;

/// Key of a logical metric (e.g. `cpu_usage`).
pub type MetricName = String;

/// Metric values of a single entity. Only successfully queried metrics are present.
pub type EntityMetrics = BTreeMap<MetricName, f64>;

/// One complete measurement round across all entities and metrics.
///
/// Every configured entity is present as a key, even if none of its queries
/// returned a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When collection of this snapshot began
    pub timestamp: DateTime<Utc>,

    /// entity -> metric -> value
    pub metrics: BTreeMap<EntityId, EntityMetrics>,
}

impl Snapshot {
    /// Create a snapshot with an empty metric map for every given entity.
    pub fn new<I, S>(timestamp: DateTime<Utc>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        Self {
            timestamp,
            metrics: entities
                .into_iter()
                .map(|entity| (entity.into(), EntityMetrics::new()))
                .collect(),
        }
    }

    /// Look up a single sample.
    pub fn get(&self, entity: &str, metric: &str) -> Option<f64> {
        self.metrics.get(entity)?.get(metric).copied()
    }

    /// Number of samples across all entities.
    pub fn sample_count(&self) -> usize {
        self.metrics.values().map(BTreeMap::len).sum()
    }
}
