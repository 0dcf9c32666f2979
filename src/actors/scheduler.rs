//! SchedulerActor - Drives the collect -> buffer -> forward cycle
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → collect Snapshot → [append to WindowBuffer] → forward → CycleReport
//!     ↑
//!     └─── Commands (RunCycle, GetWindow, Shutdown)
//! ```
//!
//! ## Single flight
//!
//! Ticks and commands are handled by one task, one at a time. A cycle that
//! takes longer than the interval delays the next one; missed ticks are
//! skipped, never queued.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, warn};

use crate::backend::BackendClient;
use crate::collector::SnapshotCollector;
use crate::config::{ConfigError, ForwardMode, ResolvedConfig};
use crate::forwarder::{Forwarder, Payload};
use crate::window::WindowBuffer;
use crate::Snapshot;

use super::messages::{CycleOutcome, CycleReport, SchedulerCommand};

/// Everything one cycle needs, owned by the scheduler
pub struct Pipeline {
    collector: SnapshotCollector,

    /// `None` in single-snapshot mode
    window: Option<WindowBuffer>,

    forwarder: Forwarder,

    /// Query budget shared by all queries of one cycle
    query_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        collector: SnapshotCollector,
        window: Option<WindowBuffer>,
        forwarder: Forwarder,
        query_timeout: Duration,
    ) -> Self {
        Self {
            collector,
            window,
            forwarder,
            query_timeout,
        }
    }

    pub fn from_config(
        config: &ResolvedConfig,
        client: Arc<dyn BackendClient>,
    ) -> Result<Self, ConfigError> {
        let window = match config.mode {
            ForwardMode::Snapshot => None,
            ForwardMode::Window(size) => Some(WindowBuffer::new(size.get())?),
        };

        Ok(Self::new(
            SnapshotCollector::from_config(client, config),
            window,
            Forwarder::from_config(&config.forward)?,
            config.query_timeout,
        ))
    }

    /// Run one cycle. Never fails: query and delivery errors are logged and
    /// reflected in the report.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let deadline = Instant::now() + self.query_timeout;
        let snapshot = self.collector.collect(deadline).await;

        let timestamp = snapshot.timestamp;
        let samples = snapshot.sample_count();
        let missing = self.collector.pair_count().saturating_sub(samples);
        debug!("collected {samples} sample(s), {missing} missing");

        let outcome = match &mut self.window {
            Some(window) => {
                if window.append(snapshot) {
                    debug!("window filled up ({} snapshots)", window.capacity());
                }

                if window.is_full() {
                    deliver(&self.forwarder, Payload::Window(window.contents())).await
                } else {
                    CycleOutcome::Buffering {
                        len: window.len(),
                        capacity: window.capacity(),
                    }
                }
            }
            None => deliver(&self.forwarder, Payload::Snapshot(&snapshot)).await,
        };

        CycleReport {
            timestamp,
            samples,
            missing,
            outcome,
        }
    }

    fn window_contents(&self) -> Option<Vec<Snapshot>> {
        self.window.as_ref().map(|window| window.contents().to_vec())
    }
}

async fn deliver(forwarder: &Forwarder, payload: Payload<'_>) -> CycleOutcome {
    match forwarder.forward(&payload).await {
        Ok(()) => CycleOutcome::Forwarded {
            snapshots: payload.len(),
        },
        Err(e) => {
            error!("error sending to downstream service: {e}");
            CycleOutcome::DeliveryFailed {
                error: e.to_string(),
            }
        }
    }
}

/// Actor that runs the pipeline on a fixed interval
pub struct SchedulerActor {
    pipeline: Pipeline,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,

    interval_duration: Duration,
}

impl SchedulerActor {
    pub fn new(
        pipeline: Pipeline,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            pipeline,
            command_rx,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first scheduled cycle starts one interval after startup. The loop
    /// runs until a Shutdown command is received.
    #[instrument(skip(self), fields(interval = ?self.interval_duration))]
    pub async fn run(mut self) {
        debug!("starting scheduler actor");

        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Timer tick - run a cycle
                _ = ticker.tick() => {
                    let report = self.pipeline.run_cycle().await;
                    log_report(&report);
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::RunCycle { respond_to } => {
                            debug!("received RunCycle command");
                            let report = self.pipeline.run_cycle().await;
                            log_report(&report);
                            let _ = respond_to.send(report);
                        }

                        SchedulerCommand::GetWindow { respond_to } => {
                            let _ = respond_to.send(self.pipeline.window_contents());
                        }

                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("scheduler actor stopped");
    }
}

fn log_report(report: &CycleReport) {
    match &report.outcome {
        CycleOutcome::Forwarded { snapshots } => debug!(
            "cycle done: forwarded {snapshots} snapshot(s), {} sample(s), {} missing",
            report.samples, report.missing
        ),
        CycleOutcome::Buffering { len, capacity } => {
            debug!("cycle done: window at {len}/{capacity}")
        }
        CycleOutcome::DeliveryFailed { .. } => warn!("cycle done: delivery failed"),
    }
}

/// Handle for controlling a SchedulerActor
///
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn the scheduler actor and return a handle to it
    pub fn spawn(pipeline: Pipeline, interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(pipeline, interval, cmd_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a cycle now and wait for its report
    ///
    /// If a scheduled cycle is in flight, this one starts after it finishes.
    pub async fn run_cycle_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunCycle { respond_to: tx })
            .await
            .context("failed to send RunCycle command")?;

        rx.await.context("failed to receive cycle report")
    }

    /// Snapshots currently buffered, oldest first (`None` in single-snapshot mode)
    pub async fn window_contents(&self) -> Result<Option<Vec<Snapshot>>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::GetWindow { respond_to: tx })
            .await
            .context("failed to send GetWindow command")?;

        rx.await.context("failed to receive window contents")
    }

    /// Stop the scheduler once the current cycle has finished
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
