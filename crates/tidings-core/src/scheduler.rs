//! Timer loop that triggers pipeline cycles.
//!
//! Holds no business logic: every tick calls [`Pipeline::run_cycle`], and
//! the run gate decides whether the cycle actually does anything.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::models::CycleReport;
use crate::pipeline::{CycleReporter, Pipeline, TracingCycleReporter};
use crate::traits::{Clock, Publisher, StateStore};

/// Default time between two ticks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    Started { tick: Duration },
    Tick,
    CycleDone { report: &'a CycleReport },
    ShuttingDown,
    Stopped { cycles: u64 },
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait SchedulerReporter: Send + Sync {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSchedulerReporter;

impl SchedulerReporter for TracingSchedulerReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::Started { tick } => {
                tracing::info!(tick_secs = tick.as_secs(), "Scheduler started");
            }
            SchedulerEvent::Tick => {
                tracing::debug!("Scheduler tick");
            }
            SchedulerEvent::CycleDone { report } => {
                if !report.is_skipped() {
                    tracing::info!(published = report.published, "Scheduled cycle done");
                }
            }
            SchedulerEvent::ShuttingDown => {
                tracing::info!("Scheduler shutting down");
            }
            SchedulerEvent::Stopped { cycles } => {
                tracing::info!(%cycles, "Scheduler stopped");
            }
        }
    }
}

/// Drives a shared pipeline on a fixed tick until cancelled.
pub struct Scheduler {
    tick: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Run until `cancel_token` fires, logging cycles with `tracing`.
    /// Returns the number of cycle attempts made.
    pub async fn run<S, P, C, SR>(
        &self,
        pipeline: Arc<Mutex<Pipeline<S, P, C>>>,
        cancel_token: CancellationToken,
        reporter: &SR,
    ) -> u64
    where
        S: StateStore + Clone,
        P: Publisher,
        C: Clock,
        SR: SchedulerReporter,
    {
        self.run_with(pipeline, cancel_token, reporter, &TracingCycleReporter)
            .await
    }

    /// Run until `cancel_token` fires. The first cycle is attempted
    /// immediately.
    ///
    /// The pipeline sits behind a mutex so an HTTP trigger can share it;
    /// a cycle in progress finishes (abandoning its remaining items)
    /// before shutdown completes.
    pub async fn run_with<S, P, C, SR, CR>(
        &self,
        pipeline: Arc<Mutex<Pipeline<S, P, C>>>,
        cancel_token: CancellationToken,
        reporter: &SR,
        cycle_reporter: &CR,
    ) -> u64
    where
        S: StateStore + Clone,
        P: Publisher,
        C: Clock,
        SR: SchedulerReporter,
        CR: CycleReporter,
    {
        reporter.report(SchedulerEvent::Started { tick: self.tick });
        let mut cycles = 0u64;

        while !cancel_token.is_cancelled() {
            reporter.report(SchedulerEvent::Tick);
            let report = pipeline
                .lock()
                .await
                .run_cycle(&cancel_token, cycle_reporter)
                .await;
            cycles += 1;
            reporter.report(SchedulerEvent::CycleDone { report: &report });

            tokio::select! {
                () = tokio::time::sleep(self.tick) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(SchedulerEvent::ShuttingDown);
        reporter.report(SchedulerEvent::Stopped { cycles });
        cycles
    }
}
