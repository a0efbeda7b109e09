//! doorman: admission monitor for a room two rival roles may never share.

mod config;
mod monitor;
mod occupancy;
mod role;
mod turnstile;

pub mod occupant;

pub use config::{ConfigError, SimConfig};
pub use monitor::{AdmissionMonitor, NotAdmitted};
pub use occupancy::{InvariantViolation, Occupancy, OccupancyState};
pub use occupant::{
    CancellationToken, Occupant, OccupantLog, RoleStats, RunReport, SimError, Simulation,
    StopHandle,
};
pub use role::Role;

/// doorman version from Cargo.toml
pub const DOORMAN_VERSION: &str = env!("CARGO_PKG_VERSION");
