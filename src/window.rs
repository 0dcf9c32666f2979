//! Sliding window of recent snapshots
//!
//! Holds at most `capacity` snapshots in insertion order. When an append would
//! exceed the capacity, the oldest snapshot is evicted first.

use std::collections::VecDeque;

use crate::Snapshot;
use crate::config::ConfigError;

#[derive(Debug, Clone)]
pub struct WindowBuffer {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
}

impl WindowBuffer {
    /// Create an empty window. A capacity of zero is a configuration error.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidWindowCapacity);
        }

        Ok(Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        })
    }

    /// Append a snapshot, evicting the oldest one if the window is at capacity.
    ///
    /// Returns `true` only for the append that first fills the window.
    pub fn append(&mut self, snapshot: Snapshot) -> bool {
        let was_full = self.is_full();
        if was_full {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
        // keep the ring contiguous so `contents` can hand out a single slice
        self.snapshots.make_contiguous();

        !was_full && self.is_full()
    }

    /// Current snapshots, oldest first.
    pub fn contents(&self) -> &[Snapshot] {
        self.snapshots.as_slices().0
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.snapshots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
