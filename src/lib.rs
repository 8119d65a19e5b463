//! Irregular background CPU noise.
//!
//! A [`BurnScheduler`] alternates random idle periods with random bursts of
//! CPU saturation, spread across a fixed [`WorkerPool`]. Workers park on a
//! handoff while idle and spin on [`burn_once`] while a burn is active.

pub mod burn;
pub mod deadline;
pub mod error;
pub mod handoff;
pub mod host;
pub mod interval;
pub mod pool;
pub mod report;
pub mod scheduler;
pub mod stop;

pub use burn::burn_once;
pub use deadline::Deadline;
pub use error::{Error, Result};
pub use host::{HostProbe, HostSummary};
pub use interval::{EntropyError, EntropySource, IntervalSpec, OsEntropy, RandomIntervalGenerator};
pub use pool::{WorkerPool, WorkerState, WorkerStats};
pub use report::PhaseWriter;
pub use scheduler::{
    BurnScheduler, Phase, PhaseKind, RunSummary, SchedulerConfig, StopCondition,
};
pub use stop::StopToken;
