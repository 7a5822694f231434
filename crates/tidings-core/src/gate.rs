//! Minimum-interval throttle between cycles, persisted across restarts.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppError;
use crate::state::LAST_RUN_KEY;
use crate::traits::{Clock, StateStore};

/// Default minimum time between two cycles.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct RunGate<S: StateStore, C: Clock> {
    store: S,
    clock: C,
    min_interval: TimeDelta,
    last_run: Option<DateTime<Utc>>,
}

impl<S: StateStore, C: Clock> RunGate<S, C> {
    /// Load the last-run timestamp. Missing or corrupt state means "never ran".
    pub fn load(store: S, clock: C, min_interval: Duration) -> Self {
        let last_run = match Self::read_last_run(&store) {
            Ok(last_run) => last_run,
            Err(e) => {
                tracing::warn!(error = %e, "Last-run state unreadable, treating as never run");
                None
            }
        };
        let min_interval = TimeDelta::from_std(min_interval).unwrap_or(TimeDelta::MAX);

        Self {
            store,
            clock,
            min_interval,
            last_run,
        }
    }

    fn read_last_run(store: &S) -> Result<Option<DateTime<Utc>>, AppError> {
        match store.get(LAST_RUN_KEY)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// True iff no cycle has run yet or at least `min_interval` has passed.
    ///
    /// A last-run time in the future (clock moved backwards) keeps the gate
    /// closed until the clock catches up.
    pub fn allowed(&self) -> bool {
        match self.last_run {
            None => true,
            Some(last) => self.clock.now() - last >= self.min_interval,
        }
    }

    /// Time left until the gate opens; zero when already open.
    pub fn remaining(&self) -> Duration {
        match self.last_run {
            None => Duration::ZERO,
            Some(last) => {
                let elapsed = self.clock.now() - last;
                match self.min_interval.checked_sub(&elapsed) {
                    Some(remaining) => remaining.to_std().unwrap_or(Duration::ZERO),
                    None => Duration::MAX,
                }
            }
        }
    }

    /// Persist `now` as the last run. The in-memory value is updated even
    /// when persisting fails, so this process keeps throttling.
    pub fn record_run(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.last_run = Some(now);
        self.store.set(LAST_RUN_KEY, serde_json::to_value(now)?)?;
        self.store.flush()
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn min_interval(&self) -> TimeDelta {
        self.min_interval
    }
}
