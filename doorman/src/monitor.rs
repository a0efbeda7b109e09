//! AdmissionMonitor - keeps goths and hipsters from sharing the club.
//!
//! Entry:
//! 1. Pass the turnstile (one entry attempt at a time, across both roles)
//! 2. Lock the counts, wait on the role's queue until admissible
//! 3. Increment, check invariants, release both locks
//!
//! Exit only takes the count lock. When a role's count drops to zero the
//! opposite role's queue is signalled; when it drops below capacity the
//! role's own queue is signalled.
//!
//! Only the turnstile holder can be parked on a queue, so each queue has at
//! most one waiter and `notify_one` is enough.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, LockResult, Mutex};
use std::time::{Duration, Instant};

use crate::config::ConfigError;
use crate::occupancy::{InvariantViolation, Occupancy};
use crate::role::Role;
use crate::turnstile::Turnstile;

/// Why a bounded or cancellable entry gave up. Counts are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotAdmitted {
    #[error("Timed out waiting for admission")]
    TimedOut,
    #[error("Monitor closed")]
    Closed,
}

/// How long an entry attempt is willing to block.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Wait {
    /// Reference behaviour: block until admitted, ignore `close()`.
    Forever,
    UntilClosed,
    Until(Instant),
}

impl Wait {
    pub(crate) fn abandoned(&self, closed: &AtomicBool) -> bool {
        !matches!(self, Wait::Forever) && closed.load(Ordering::Acquire)
    }
}

/// Nothing foreign runs under a monitor lock, so a poisoned lock still guards
/// plain counts. Recover the guard and let the invariant check judge them.
pub(crate) fn recover<G>(result: LockResult<G>) -> G {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("Monitor lock poisoned - recovering guard");
            poisoned.into_inner()
        }
    }
}

/// Print the violation and terminate. Nothing is unwound or unlocked: once the
/// counts are inconsistent no further operation means anything.
fn fatal(violation: InvariantViolation) -> ! {
    tracing::error!(%violation, "Invariant violated - terminating");
    eprintln!("sync error: {violation}");
    std::process::exit(1);
}

/// Admission monitor for a room of fixed capacity shared by two rival roles.
///
/// Owned by the driver and shared by reference (usually `Arc`) with every
/// occupant thread.
#[derive(Debug)]
pub struct AdmissionMonitor {
    capacity: usize,
    turnstile: Turnstile,
    occupancy: Mutex<Occupancy>,
    /// Wait queues indexed by `Role::index`.
    queues: [Condvar; 2],
}

impl AdmissionMonitor {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            turnstile: Turnstile::default(),
            occupancy: Mutex::new(Occupancy::default()),
            queues: [Condvar::new(), Condvar::new()],
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until `role` is admitted.
    ///
    /// On return the caller holds one slot of its role and must give it back
    /// with [`exit`](Self::exit). Not affected by [`close`](Self::close).
    pub fn enter(&self, role: Role) {
        if let Err(reason) = self.admit(role, Wait::Forever) {
            // Bug: an unbounded wait has no way to give up
            debug_assert!(false, "unbounded entry gave up: {reason}");
            tracing::error!(%role, %reason, "Bug: unbounded entry gave up");
        }
    }

    /// Like [`enter`](Self::enter), but give up after `timeout`.
    ///
    /// Time spent queued at the turnstile counts against the timeout. Also
    /// returns [`NotAdmitted::Closed`] if the monitor is closed meanwhile.
    pub fn enter_timeout(&self, role: Role, timeout: Duration) -> Result<(), NotAdmitted> {
        let wait = Instant::now()
            .checked_add(timeout)
            .map_or(Wait::UntilClosed, Wait::Until);
        self.admit(role, wait)
    }

    /// Like [`enter`](Self::enter), but give up once the monitor is closed.
    pub fn enter_unless_closed(&self, role: Role) -> Result<(), NotAdmitted> {
        self.admit(role, Wait::UntilClosed)
    }

    fn admit(&self, role: Role, wait: Wait) -> Result<(), NotAdmitted> {
        let _turn = self.turnstile.pass(wait)?;
        tracing::trace!(%role, "Passed turnstile");

        let queue = &self.queues[role.index()];
        let mut occupancy = recover(self.occupancy.lock());
        loop {
            if wait.abandoned(self.closed_flag()) {
                return Err(NotAdmitted::Closed);
            }
            if occupancy.admits(role, self.capacity) {
                break;
            }
            tracing::trace!(
                %role,
                goths = occupancy.goths,
                hipsters = occupancy.hipsters,
                "Waiting for admission"
            );
            occupancy = match wait {
                Wait::Forever | Wait::UntilClosed => recover(queue.wait(occupancy)),
                Wait::Until(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::debug!(%role, "Entry timed out");
                        return Err(NotAdmitted::TimedOut);
                    }
                    recover(queue.wait_timeout(occupancy, deadline - now)).0
                }
            };
        }

        occupancy.increment(role);
        self.verify(&occupancy);
        tracing::debug!(%role, count = occupancy.count(role), "Admitted");
        // `occupancy` drops before `_turn`: counts unlock first, then the gate.
        Ok(())
    }

    /// Give back one slot of `role`. Never blocks on the turnstile.
    pub fn exit(&self, role: Role) {
        let mut occupancy = recover(self.occupancy.lock());
        let was_full = occupancy.count(role) >= self.capacity;

        if let Err(violation) = occupancy.decrement(role) {
            fatal(violation);
        }
        let remaining = occupancy.count(role);
        if remaining == 0 {
            self.queues[role.other().index()].notify_one();
        }
        if was_full {
            self.queues[role.index()].notify_one();
        }

        self.verify(&occupancy);
        tracing::debug!(%role, count = remaining, "Left");
    }

    /// Release every thread blocked in a cancellable entry.
    ///
    /// Plain [`enter`](Self::enter) keeps waiting and [`exit`](Self::exit)
    /// keeps working, so occupants already inside can still leave.
    pub fn close(&self) {
        if !self.turnstile.close() {
            return;
        }
        let _occupancy = recover(self.occupancy.lock());
        for queue in &self.queues {
            queue.notify_all();
        }
        tracing::info!("Admission monitor closed");
    }

    pub fn is_closed(&self) -> bool {
        self.turnstile.is_closed()
    }

    pub fn occupancy(&self) -> Occupancy {
        *recover(self.occupancy.lock())
    }

    pub fn count(&self, role: Role) -> usize {
        self.occupancy().count(role)
    }

    /// Overwrite the counts and run the invariant check.
    ///
    /// Harness entry point for exercising the fatal path; an invalid pair
    /// terminates the process.
    #[doc(hidden)]
    pub fn force_occupancy(&self, goths: usize, hipsters: usize) {
        let mut occupancy = recover(self.occupancy.lock());
        *occupancy = Occupancy::new(goths, hipsters);
        tracing::warn!(goths, hipsters, "Forcing occupancy");
        self.verify(&occupancy);
    }

    fn verify(&self, occupancy: &Occupancy) {
        if let Err(violation) = occupancy.check(self.capacity) {
            fatal(violation);
        }
    }

    fn closed_flag(&self) -> &AtomicBool {
        self.turnstile.closed_flag()
    }
}
