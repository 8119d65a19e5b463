//! Error types for the burn pool and scheduler

use std::fmt;
use std::io;

/// Result type for toaster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can stop the load generator
///
/// None of these are recoverable: once the pool is running the only
/// failure left is the entropy source going away.
#[derive(Debug)]
pub enum Error {
    /// Interval lower bound is above its upper bound (min, max in ms)
    InvalidInterval(u64, u64),

    /// A pool was requested with zero workers
    EmptyPool,

    /// OS entropy source failed permanently
    Entropy(String),

    /// Spawning worker `index` failed
    WorkerSpawn { index: usize, source: io::Error },

    /// Workers exited before reporting ready (ready, expected)
    WorkerStartup { ready: usize, expected: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInterval(min, max) => {
                write!(f, "invalid interval: min {}ms is greater than max {}ms", min, max)
            }
            Error::EmptyPool => write!(f, "worker pool needs at least one thread"),
            Error::Entropy(msg) => write!(f, "entropy source unavailable: {}", msg),
            Error::WorkerSpawn { index, source } => {
                write!(f, "failed to spawn worker {}: {}", index, source)
            }
            Error::WorkerStartup { ready, expected } => write!(
                f,
                "only {} of {} workers reached their run loop",
                ready, expected
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WorkerSpawn { source, .. } => Some(source),
            _ => None,
        }
    }
}
