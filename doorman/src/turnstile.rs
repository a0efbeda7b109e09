//! Turnstile - the gate every entry attempt passes through, one at a time.
//!
//! A plain `Mutex<()>` cannot be acquired with a deadline or abandoned on
//! shutdown, so the gate is a flag behind its own mutex plus a condvar.
//! Exits never touch it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Instant;

use crate::monitor::{NotAdmitted, Wait, recover};

#[derive(Debug, Default)]
pub(crate) struct Turnstile {
    held: Mutex<bool>,
    released: Condvar,
    /// Set by the monitor's `close()`; shared so drops can wake everyone.
    closed: AtomicBool,
}

/// Proof of holding the turnstile. Releases it on drop.
#[must_use = "dropping the guard releases the turnstile immediately"]
pub(crate) struct TurnstileGuard<'a> {
    turnstile: &'a Turnstile,
}

impl Turnstile {
    pub(crate) fn pass(&self, wait: Wait) -> Result<TurnstileGuard<'_>, NotAdmitted> {
        let held = recover(self.held.lock());
        let blocked = |held: &mut bool| *held && !wait.abandoned(&self.closed);

        let mut held = match wait {
            Wait::Forever | Wait::UntilClosed => {
                recover(self.released.wait_while(held, blocked))
            }
            Wait::Until(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                recover(self.released.wait_timeout_while(held, timeout, blocked)).0
            }
        };

        if wait.abandoned(&self.closed) {
            return Err(NotAdmitted::Closed);
        }
        if *held {
            return Err(NotAdmitted::TimedOut);
        }

        *held = true;
        Ok(TurnstileGuard { turnstile: self })
    }

    /// Mark closed and wake everyone queued at the gate.
    ///
    /// Returns `false` if the gate was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Taking the lock orders the store before any waiter's next predicate check.
        let _held = recover(self.held.lock());
        self.released.notify_all();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn closed_flag(&self) -> &AtomicBool {
        &self.closed
    }

    #[cfg(test)]
    fn is_held(&self) -> bool {
        *recover(self.held.lock())
    }
}

impl Drop for TurnstileGuard<'_> {
    fn drop(&mut self) {
        let mut held = recover(self.turnstile.held.lock());
        *held = false;
        // After close, a single wakeup could land on a waiter that is about to
        // give up, stranding an unbounded `enter` behind it.
        if self.turnstile.is_closed() {
            self.turnstile.released.notify_all();
        } else {
            self.turnstile.released.notify_one();
        }
    }
}
