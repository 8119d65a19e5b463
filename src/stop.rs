//! External cancellation for the controller loop
//!
//! A [`StopToken`] is cancelled from outside (Ctrl-C handler, another
//! thread) and interrupts the controller's timed sleeps. Clones share the
//! same flag.

use crate::deadline::Deadline;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake any sleeper
    pub fn cancel(&self) {
        {
            let mut cancelled = self
                .inner
                .cancelled
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *cancelled = true;
        }
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep until `deadline` has passed.
    ///
    /// Returns `false` if the token was cancelled first. Early condvar
    /// wake-ups go back to sleep, so on `true` the deadline really passed.
    pub fn sleep_until(&self, deadline: Deadline) -> bool {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled {
                return false;
            }
            if deadline.has_passed() {
                return true;
            }
            let (guard, _) = self
                .inner
                .condvar
                .wait_timeout(cancelled, deadline.remaining())
                .unwrap_or_else(PoisonError::into_inner);
            cancelled = guard;
        }
    }

    /// Sleep for `duration`, see [`sleep_until`](Self::sleep_until)
    pub fn sleep(&self, duration: Duration) -> bool {
        self.sleep_until(Deadline::from_now(duration))
    }
}
