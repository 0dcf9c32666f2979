//! Snapshot collection
//!
//! One call to [`SnapshotCollector::collect`] queries every (entity, metric)
//! pair and assembles the answers into a single [`Snapshot`].
//!
//! ## Failure isolation
//!
//! Each pair is independent: a failing query is logged and leaves its metric
//! absent for that entity, every other pair is still attempted. The snapshot
//! always contains every configured entity.
//!
//! ## Message Flow
//!
//! ```text
//! entities × metrics → resolve template → query backend (bounded fan-out) → Snapshot
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, trace, warn};

use crate::backend::{BackendClient, QueryError};
use crate::config::ResolvedConfig;
use crate::template::QueryTemplate;
use crate::{EntityId, MetricName, Snapshot};

pub struct SnapshotCollector {
    /// Backend all queries are sent to
    client: Arc<dyn BackendClient>,

    entities: Vec<EntityId>,

    queries: Vec<(MetricName, QueryTemplate)>,

    /// Maximum number of queries in flight at once
    concurrency: usize,
}

impl SnapshotCollector {
    pub fn new(
        client: Arc<dyn BackendClient>,
        entities: Vec<EntityId>,
        queries: Vec<(MetricName, QueryTemplate)>,
        concurrency: NonZeroUsize,
    ) -> Self {
        Self {
            client,
            entities,
            queries,
            concurrency: concurrency.get(),
        }
    }

    pub fn from_config(client: Arc<dyn BackendClient>, config: &ResolvedConfig) -> Self {
        Self::new(
            client,
            config.entities.clone(),
            config.queries.clone(),
            config.max_concurrent_queries,
        )
    }

    /// Number of (entity, metric) pairs queried per snapshot
    pub fn pair_count(&self) -> usize {
        self.entities.len() * self.queries.len()
    }

    /// Collect one snapshot.
    ///
    /// The snapshot is timestamped when collection begins; that instant is
    /// also the evaluation time of every query. All queries share `deadline`.
    #[instrument(skip_all, fields(pairs = self.pair_count()))]
    pub async fn collect(&self, deadline: Instant) -> Snapshot {
        let timestamp = Utc::now();
        let mut snapshot = Snapshot::new(timestamp, self.entities.iter().cloned());

        // resolved up front so the fan-out owns its inputs
        let pairs: Vec<(EntityId, MetricName, String)> = self
            .entities
            .iter()
            .flat_map(|entity| {
                self.queries
                    .iter()
                    .map(move |(metric, template)| {
                        (entity.clone(), metric.clone(), template.resolve(entity))
                    })
            })
            .collect();

        let client = &self.client;
        let budget = deadline.saturating_duration_since(Instant::now());
        let mut answers = stream::iter(pairs)
            .map(|(entity, metric, query)| async move {
                // enforced here too, for clients that ignore the deadline
                let answer = client.query(&query, timestamp, deadline);
                let result = match timeout_at(deadline, answer).await {
                    Ok(result) => result,
                    Err(_) => Err(QueryError::Timeout(budget)),
                };
                (entity, metric, query, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((entity, metric, query, result)) = answers.next().await {
            let value = match result {
                Ok(result) => result.first_value(),
                Err(e) => {
                    warn!("query error [{metric}] for {entity}: {e}");
                    continue;
                }
            };

            match value {
                Some(value) => {
                    trace!("query {query} returned {value}");
                    if let Some(metrics) = snapshot.metrics.get_mut(&entity) {
                        metrics.insert(metric, value);
                    }
                }
                None => debug!("query {query} returned no sample"),
            }
        }

        snapshot
    }
}
