//! Binary semaphore used to park idle workers
//!
//! A post before the matching wait is kept (one permit at most), so a
//! worker that is a little late to block never misses its wake.

use std::sync::{Condvar, Mutex, PoisonError};
#[cfg(test)]
use std::time::Duration;

pub struct Handoff {
    /// true = permit available
    permit: Mutex<bool>,
    condvar: Condvar,
}

impl Handoff {
    pub fn new() -> Self {
        Self {
            permit: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Block until a permit is posted, then consume it
    pub fn wait(&self) {
        let guard = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self
            .condvar
            .wait_while(guard, |permit| !*permit)
            .unwrap_or_else(PoisonError::into_inner);
        *guard = false;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if a permit was consumed.
    #[cfg(test)]
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |permit| !*permit)
            .unwrap_or_else(PoisonError::into_inner);
        let woken = *guard;
        *guard = false;
        woken
    }

    /// Make a permit available and wake the waiter, if any
    pub fn post(&self) {
        {
            let mut guard = self.permit.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = true;
        }
        self.condvar.notify_one();
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}
