//! Random phase durations drawn from the OS entropy source
//!
//! Durations are uniform over a closed `[min, max]` millisecond window.
//! The generator never falls back to a seeded PRNG: if the OS cannot hand
//! out random bytes, that is a fatal error for the caller.

use crate::error::{Error, Result};
use log::trace;
use rand::rngs::OsRng;
use rand::TryRngCore;

/// Validated `(min, max)` pair of milliseconds, `min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSpec {
    min_ms: u64,
    max_ms: u64,
}

impl IntervalSpec {
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self> {
        if min_ms > max_ms {
            return Err(Error::InvalidInterval(min_ms, max_ms));
        }
        Ok(Self { min_ms, max_ms })
    }

    /// Zero-width interval that always yields `ms`
    pub fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub fn min_ms(&self) -> u64 {
        self.min_ms
    }

    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    pub fn is_fixed(&self) -> bool {
        self.min_ms == self.max_ms
    }

    /// Map a full-width random word onto the interval with a multiply-shift.
    /// Uniform to within 2^-64; `u64::MAX` maps to `max`.
    fn map(&self, word: u64) -> u64 {
        let width = self.max_ms - self.min_ms;
        if width == 0 {
            return self.min_ms;
        }
        let span = u128::from(width) + 1;
        let offset = (u128::from(word) * span) >> 64;
        self.min_ms + offset as u64
    }
}

/// Failure reported by an entropy source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntropyError {
    /// Source momentarily unavailable, try again
    Transient,
    /// Source is gone for good
    Permanent(String),
}

/// Source of uniformly random 64-bit words
pub trait EntropySource: Send {
    fn next_word(&mut self) -> std::result::Result<u64, EntropyError>;
}

/// The operating system's entropy source (`getrandom(2)` on Linux)
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn next_word(&mut self) -> std::result::Result<u64, EntropyError> {
        OsRng.try_next_u64().map_err(|err| {
            let msg = err.to_string();
            match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => EntropyError::Transient,
                _ => EntropyError::Permanent(msg),
            }
        })
    }
}

/// Draws phase durations from an entropy source
pub struct RandomIntervalGenerator<S = OsEntropy> {
    source: S,
}

impl RandomIntervalGenerator<OsEntropy> {
    /// Generator backed by the OS entropy source
    ///
    /// Performs one draw up front so an unusable source fails at startup
    /// rather than in the middle of a run.
    pub fn new() -> Result<Self> {
        Self::with_source(OsEntropy)
    }
}

impl<S: EntropySource> RandomIntervalGenerator<S> {
    pub fn with_source(source: S) -> Result<Self> {
        let mut generator = Self { source };
        generator.word()?;
        Ok(generator)
    }

    /// Draw a duration in milliseconds, uniform over `[min, max]`
    pub fn next(&mut self, spec: IntervalSpec) -> Result<u64> {
        if spec.is_fixed() {
            return Ok(spec.min_ms);
        }
        Ok(spec.map(self.word()?))
    }

    fn word(&mut self) -> Result<u64> {
        let mut retries = 0u64;
        loop {
            match self.source.next_word() {
                Ok(word) => {
                    if retries > 0 {
                        trace!("entropy source recovered after {} retries", retries);
                    }
                    return Ok(word);
                }
                Err(EntropyError::Transient) => {
                    retries += 1;
                    std::hint::spin_loop();
                }
                Err(EntropyError::Permanent(msg)) => return Err(Error::Entropy(msg)),
            }
        }
    }
}
