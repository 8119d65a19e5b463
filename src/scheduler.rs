//! Wait/burn controller loop
//!
//! Alternates a random idle phase with a random burn phase, fanning each
//! burn out to the worker pool. The loop reports every phase to a caller
//! supplied sink and never formats output itself.

use crate::deadline::Deadline;
use crate::error::Result;
use crate::interval::{EntropySource, IntervalSpec, OsEntropy, RandomIntervalGenerator};
use crate::pool::WorkerPool;
use crate::stop::StopToken;
use chrono::{DateTime, Utc};
use log::debug;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Wait,
    Burn,
}

impl PhaseKind {
    pub fn marker(&self) -> char {
        match self {
            PhaseKind::Wait => 'W',
            PhaseKind::Burn => 'B',
        }
    }
}

/// One phase transition, as reported to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub kind: PhaseKind,
    /// Wall-clock time the phase started, for correlating with other logs
    pub timestamp: DateTime<Utc>,
    /// Exact duration handed to the sleep or burn
    pub duration_ms: u64,
}

impl fmt::Display for Phase {
    /// `<unix seconds>.<millis> <W|B> <duration ms>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.timestamp.timestamp_millis();
        write!(
            f,
            "{}.{:03} {} {}",
            millis.div_euclid(1000),
            millis.rem_euclid(1000),
            self.kind.marker(),
            self.duration_ms
        )
    }
}

/// How many wait/burn iterations to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    Iterations(u64),
    /// Until the stop token is cancelled
    Forever,
}

impl StopCondition {
    fn should_continue(&self, completed: u64) -> bool {
        match self {
            StopCondition::Iterations(n) => completed < *n,
            StopCondition::Forever => true,
        }
    }
}

impl From<Option<u64>> for StopCondition {
    fn from(iterations: Option<u64>) -> Self {
        iterations.map_or(StopCondition::Forever, StopCondition::Iterations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub wait: IntervalSpec,
    pub burn: IntervalSpec,
    pub stop: StopCondition,
}

/// What a run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Full wait + burn iterations completed
    pub iterations: u64,
    pub waited_ms: u64,
    pub burned_ms: u64,
    /// Ended by the stop token rather than the stop condition
    pub cancelled: bool,
}

pub struct BurnScheduler<S = OsEntropy> {
    config: SchedulerConfig,
    generator: RandomIntervalGenerator<S>,
    stop: StopToken,
}

impl BurnScheduler<OsEntropy> {
    pub fn new(config: SchedulerConfig, stop: StopToken) -> Result<Self> {
        Ok(Self::with_generator(
            config,
            RandomIntervalGenerator::new()?,
            stop,
        ))
    }
}

impl<S: EntropySource> BurnScheduler<S> {
    pub fn with_generator(
        config: SchedulerConfig,
        generator: RandomIntervalGenerator<S>,
        stop: StopToken,
    ) -> Self {
        Self {
            config,
            generator,
            stop,
        }
    }

    /// Run wait/burn iterations until the stop condition is met or the
    /// token is cancelled.
    ///
    /// A burn phase always ends with `stop_burn`, including when it is cut
    /// short by cancellation, so the pool is left idle on return.
    pub fn run<F>(&mut self, pool: &WorkerPool, mut sink: F) -> Result<RunSummary>
    where
        F: FnMut(&Phase),
    {
        let mut summary = RunSummary::default();

        while self.config.stop.should_continue(summary.iterations) {
            if self.stop.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let wait = self.generator.next(self.config.wait)?;
            sink(&phase(PhaseKind::Wait, wait));
            if !self.stop.sleep(Duration::from_millis(wait)) {
                summary.cancelled = true;
                break;
            }
            summary.waited_ms += wait;

            let burn = self.generator.next(self.config.burn)?;
            sink(&phase(PhaseKind::Burn, burn));
            let started = Instant::now();
            let deadline = Deadline::after(started, Duration::from_millis(burn));

            pool.start_burn();
            let finished = self.stop.sleep_until(deadline);
            pool.stop_burn();

            let elapsed = started.elapsed();
            debug!(
                "burn of {}ms on {} worker(s) took {:.3}ms",
                burn,
                pool.size(),
                elapsed.as_secs_f64() * 1000.0
            );
            if !finished {
                summary.burned_ms += elapsed.as_millis() as u64;
                summary.cancelled = true;
                break;
            }
            summary.burned_ms += burn;
            summary.iterations += 1;
        }

        Ok(summary)
    }
}

fn phase(kind: PhaseKind, duration_ms: u64) -> Phase {
    Phase {
        kind,
        timestamp: Utc::now(),
        duration_ms,
    }
}
