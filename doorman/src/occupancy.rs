//! Per-role head counts and the invariants they must satisfy.
//!
//! The checker is a pure function over a snapshot so it can be exercised
//! without a monitor. The monitor decides what a violation means (it is fatal).

use serde::Serialize;

use crate::role::Role;

/// Snapshot of how many occupants of each role are inside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub goths: usize,
    pub hipsters: usize,
}

/// State-machine view of an [`Occupancy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OccupancyState {
    Empty,
    OccupiedBy { role: Role, count: usize },
    /// Both roles inside. Only reachable if the monitor is broken.
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("bad social mixup! Goths = {goths}, Hipsters = {hipsters}")]
    Mixed { goths: i64, hipsters: i64 },
    #[error("too many people in the club! Goths = {goths}, Hipsters = {hipsters}")]
    OverCapacity { goths: i64, hipsters: i64 },
    #[error("lost track of people! Goths = {goths}, Hipsters = {hipsters}")]
    LostTrack { goths: i64, hipsters: i64 },
}

impl Occupancy {
    pub fn new(goths: usize, hipsters: usize) -> Self {
        Self { goths, hipsters }
    }

    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Goth => self.goths,
            Role::Hipster => self.hipsters,
        }
    }

    fn count_mut(&mut self, role: Role) -> &mut usize {
        match role {
            Role::Goth => &mut self.goths,
            Role::Hipster => &mut self.hipsters,
        }
    }

    pub fn total(&self) -> usize {
        self.goths + self.hipsters
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Whether `role` may come in right now.
    pub fn admits(&self, role: Role, capacity: usize) -> bool {
        self.count(role.other()) == 0 && self.count(role) < capacity
    }

    pub(crate) fn increment(&mut self, role: Role) {
        *self.count_mut(role) += 1;
    }

    /// Remove one occupant of `role`.
    ///
    /// Counts are unsigned, so leaving an already empty role cannot be
    /// represented; it is reported as `LostTrack` with the count it would have had.
    pub(crate) fn decrement(&mut self, role: Role) -> Result<(), InvariantViolation> {
        let count = self.count_mut(role);
        match count.checked_sub(1) {
            Some(next) => {
                *count = next;
                Ok(())
            }
            None => {
                let (goths, hipsters) = match role {
                    Role::Goth => (-1, self.hipsters as i64),
                    Role::Hipster => (self.goths as i64, -1),
                };
                Err(InvariantViolation::LostTrack { goths, hipsters })
            }
        }
    }

    /// Check both invariants: no mixing, and each role within `[0, capacity]`.
    pub fn check(&self, capacity: usize) -> Result<(), InvariantViolation> {
        let (goths, hipsters) = (self.goths as i64, self.hipsters as i64);
        if self.goths > 0 && self.hipsters > 0 {
            return Err(InvariantViolation::Mixed { goths, hipsters });
        }
        if self.goths > capacity || self.hipsters > capacity {
            return Err(InvariantViolation::OverCapacity { goths, hipsters });
        }
        Ok(())
    }

    pub fn state(&self) -> OccupancyState {
        match (self.goths, self.hipsters) {
            (0, 0) => OccupancyState::Empty,
            (count, 0) => OccupancyState::OccupiedBy {
                role: Role::Goth,
                count,
            },
            (0, count) => OccupancyState::OccupiedBy {
                role: Role::Hipster,
                count,
            },
            _ => OccupancyState::Mixed,
        }
    }
}
