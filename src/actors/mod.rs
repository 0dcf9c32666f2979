//! Actor driving the collection cycle
//!
//! The scheduler runs as an independent async task and is controlled through
//! a cloneable handle that talks to it over a Tokio mpsc channel.
//!
//! ## Architecture Overview
//!
//! ```text
//!        ┌──────────────────┐  commands   ┌─────────────────────────────┐
//!        │ SchedulerHandle  │ ──────────▶ │       SchedulerActor        │
//!        └──────────────────┘             │  ticker ─▶ Pipeline::cycle  │
//!                                         └──────────────┬──────────────┘
//!                                                        │
//!                   ┌────────────────────┬───────────────┴─────┐
//!                   ▼                    ▼                     ▼
//!          SnapshotCollector        WindowBuffer           Forwarder
//!          (backend fan-out)        (optional)             (HTTP POST)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for cycle reports and window queries

pub mod messages;
pub mod scheduler;
