//! Message types for actor communication
//!
//! Commands are sent to the scheduler actor via mpsc; answers come back on
//! oneshot channels.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::Snapshot;

/// Commands that can be sent to the SchedulerActor
///
/// Commands are handled by the same task that runs scheduled cycles, so a
/// command never overlaps with a running cycle.
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a cycle immediately (bypassing the interval timer)
    ///
    /// Used for testing and one-shot runs.
    RunCycle {
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Get the buffered window (`None` in single-snapshot mode)
    GetWindow {
        respond_to: oneshot::Sender<Option<Vec<Snapshot>>>,
    },

    /// Stop the scheduler after the current cycle
    Shutdown,
}

/// Summary of one collect -> buffer -> forward cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Timestamp of the collected snapshot
    pub timestamp: DateTime<Utc>,

    /// Number of (entity, metric) pairs that returned a sample
    pub samples: usize,

    /// Number of pairs without a sample (failed, empty or timed out)
    pub missing: usize,

    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Payload was accepted downstream
    Forwarded { snapshots: usize },

    /// Window mode: snapshot buffered, window not full yet
    Buffering { len: usize, capacity: usize },

    /// Delivery failed; the message describes why
    DeliveryFailed { error: String },
}
