//! Occupants and the simulation driving them.
//!
//! Each occupant is a named OS thread looping enter → dwell → exit against a
//! shared [`AdmissionMonitor`]. The driver owns the monitor and a
//! [`CancellationToken`]; stopping cancels the token and closes the monitor so
//! occupants parked at the door give up instead of waiting forever.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
pub use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, SimConfig};
use crate::monitor::AdmissionMonitor;
use crate::occupancy::Occupancy;
use crate::role::Role;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to spawn occupant thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Occupant {role} #{id} panicked")]
    OccupantPanicked { role: Role, id: usize },
}

/// One visitor, looping through the club.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub role: Role,
    pub id: usize,
}

/// What a single occupant saw over its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupantLog {
    pub occupant: Occupant,
    pub admissions: u64,
    /// Largest own-role count seen while inside.
    pub peak: usize,
    pub samples: u64,
    /// Samples where the room broke an invariant or did not count us.
    pub anomalies: u64,
}

impl OccupantLog {
    fn new(occupant: Occupant) -> Self {
        Self {
            occupant,
            admissions: 0,
            peak: 0,
            samples: 0,
            anomalies: 0,
        }
    }

    fn record(&mut self, inside: Occupancy, capacity: usize) {
        let count = inside.count(self.occupant.role);
        self.samples += 1;
        self.peak = self.peak.max(count);
        if count == 0 || inside.check(capacity).is_err() {
            tracing::error!(
                role = %self.occupant.role,
                id = self.occupant.id,
                goths = inside.goths,
                hipsters = inside.hipsters,
                "Inconsistent occupancy sampled while inside"
            );
            self.anomalies += 1;
        }
    }
}

impl Occupant {
    pub fn new(role: Role, id: usize) -> Self {
        Self { role, id }
    }

    /// Visit the club until `iterations` visits are done, `stop` fires, or the
    /// monitor is closed.
    pub fn run(
        self,
        monitor: &AdmissionMonitor,
        max_dwell: Duration,
        iterations: Option<u64>,
        stop: &CancellationToken,
    ) -> OccupantLog {
        let mut log = OccupantLog::new(self);
        let mut rng = rand::thread_rng();

        while iterations.is_none_or(|limit| log.admissions < limit) && !stop.is_cancelled() {
            tracing::info!(role = %self.role, id = self.id, "Wants to enter");
            if let Err(reason) = monitor.enter_unless_closed(self.role) {
                tracing::debug!(role = %self.role, id = self.id, %reason, "Gave up entering");
                break;
            }
            log.admissions += 1;
            tracing::info!(
                role = %self.role,
                id = self.id,
                count = monitor.count(self.role),
                "In the club"
            );

            let dwell = random_dwell(&mut rng, max_dwell);
            std::thread::sleep(dwell / 2);
            log.record(monitor.occupancy(), monitor.capacity());
            std::thread::sleep(dwell - dwell / 2);

            monitor.exit(self.role);
            tracing::info!(
                role = %self.role,
                id = self.id,
                count = monitor.count(self.role),
                "Left the club"
            );
        }

        tracing::debug!(
            role = %self.role,
            id = self.id,
            admissions = log.admissions,
            "Occupant finished"
        );
        log
    }
}

fn random_dwell(rng: &mut impl Rng, max: Duration) -> Duration {
    let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(rng.gen_range(0..=max_micros))
}

/// Per-role totals in a [`RunReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleStats {
    pub occupants: usize,
    pub admissions: u64,
    pub peak: usize,
}

/// Aggregate of every occupant's log once the simulation is joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub goths: RoleStats,
    pub hipsters: RoleStats,
    pub samples: u64,
    pub anomalies: u64,
    pub final_occupancy: Occupancy,
}

impl RunReport {
    pub fn stats(&self, role: Role) -> &RoleStats {
        match role {
            Role::Goth => &self.goths,
            Role::Hipster => &self.hipsters,
        }
    }

    fn stats_mut(&mut self, role: Role) -> &mut RoleStats {
        match role {
            Role::Goth => &mut self.goths,
            Role::Hipster => &mut self.hipsters,
        }
    }

    fn absorb(&mut self, log: &OccupantLog) {
        let stats = self.stats_mut(log.occupant.role);
        stats.occupants += 1;
        stats.admissions += log.admissions;
        stats.peak = stats.peak.max(log.peak);
        self.samples += log.samples;
        self.anomalies += log.anomalies;
    }

    pub fn total_admissions(&self) -> u64 {
        self.goths.admissions + self.hipsters.admissions
    }
}

/// Stops a running [`Simulation`] from anywhere.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
    monitor: Arc<AdmissionMonitor>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Stopping simulation");
        }
        self.token.cancel();
        self.monitor.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token occupants watch, for callers that want to await it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// A set of occupant threads sharing one monitor.
pub struct Simulation {
    monitor: Arc<AdmissionMonitor>,
    token: CancellationToken,
    workers: Vec<(Occupant, JoinHandle<OccupantLog>)>,
}

impl Simulation {
    /// Build a monitor from `config.capacity` and start the occupants.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let monitor = Arc::new(AdmissionMonitor::new(config.capacity)?);
        Self::start(monitor, config)
    }

    /// Start `config.goths` goths and `config.hipsters` hipsters on `monitor`.
    ///
    /// The monitor's own capacity governs admission; `config.capacity` is only
    /// used by [`from_config`](Self::from_config).
    pub fn start(monitor: Arc<AdmissionMonitor>, config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        if monitor.capacity() != config.capacity {
            tracing::warn!(
                monitor = monitor.capacity(),
                config = config.capacity,
                "Configured capacity differs from monitor capacity"
            );
        }

        let mut simulation = Self {
            monitor,
            token: CancellationToken::new(),
            workers: Vec::with_capacity(config.goths + config.hipsters),
        };

        for role in Role::ALL {
            for id in 0..config.occupants(role) {
                if let Err(e) = simulation.spawn(Occupant::new(role, id), config) {
                    tracing::error!(%role, id, error = %e, "Failed to spawn occupant");
                    simulation.stop_handle().stop();
                    // Already failing; the join result adds nothing.
                    let _ = simulation.join();
                    return Err(e);
                }
            }
        }

        tracing::info!(
            goths = config.goths,
            hipsters = config.hipsters,
            capacity = simulation.monitor.capacity(),
            "Simulation started"
        );
        Ok(simulation)
    }

    fn spawn(&mut self, occupant: Occupant, config: &SimConfig) -> Result<(), SimError> {
        let monitor = Arc::clone(&self.monitor);
        let token = self.token.clone();
        let max_dwell = config.max_dwell;
        let iterations = config.iterations;

        let handle = std::thread::Builder::new()
            .name(format!("{}-{}", occupant.role, occupant.id))
            .spawn(move || occupant.run(&monitor, max_dwell, iterations, &token))?;
        self.workers.push((occupant, handle));
        Ok(())
    }

    pub fn monitor(&self) -> &Arc<AdmissionMonitor> {
        &self.monitor
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
            monitor: Arc::clone(&self.monitor),
        }
    }

    /// Whether every occupant has finished (bounded runs end on their own).
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Wait for every occupant and aggregate their logs.
    ///
    /// Unbounded runs only return after [`StopHandle::stop`].
    pub fn join(self) -> Result<RunReport, SimError> {
        let mut report = RunReport::default();
        let mut first_error = None;

        for (occupant, handle) in self.workers {
            match handle.join() {
                Ok(log) => report.absorb(&log),
                Err(_) => {
                    tracing::error!(role = %occupant.role, id = occupant.id, "Occupant panicked");
                    first_error.get_or_insert(SimError::OccupantPanicked {
                        role: occupant.role,
                        id: occupant.id,
                    });
                }
            }
        }

        report.final_occupancy = self.monitor.occupancy();
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn quick(goths: usize, hipsters: usize) -> SimConfig {
        SimConfig::default()
            .with_occupants(goths, hipsters)
            .with_max_dwell(Duration::from_millis(2))
    }

    #[test]
    fn three_and_three_at_capacity_six_drain_to_empty() {
        let config = quick(3, 3).with_iterations(20);
        let report = Simulation::from_config(&config).unwrap().join().unwrap();

        for role in Role::ALL {
            assert_eq!(report.stats(role).occupants, 3);
            assert_eq!(report.stats(role).admissions, 60);
        }
        assert_eq!(report.samples, 120);
        assert_eq!(report.anomalies, 0);
        assert!(report.goths.peak <= 3);
        assert!(report.hipsters.peak <= 3);
        assert!(report.final_occupancy.is_empty());
    }

    #[test]
    fn capacity_one_alternates_for_a_thousand_visits() {
        let config = quick(1, 1)
            .with_capacity(1)
            .with_max_dwell(Duration::ZERO)
            .with_iterations(500);
        let report = Simulation::from_config(&config).unwrap().join().unwrap();

        assert_eq!(report.total_admissions(), 1000);
        assert_eq!(report.anomalies, 0);
        assert_eq!(report.goths.peak, 1);
        assert_eq!(report.hipsters.peak, 1);
        assert!(report.final_occupancy.is_empty());
    }

    #[test]
    fn goths_alone_never_exceed_capacity() {
        let config = quick(5, 0).with_capacity(2).with_iterations(10);
        let report = Simulation::from_config(&config).unwrap().join().unwrap();

        assert_eq!(report.goths.occupants, 5);
        assert_eq!(report.goths.admissions, 50);
        assert!(report.goths.peak <= 2);
        assert_eq!(report.hipsters, RoleStats::default());
        assert_eq!(report.anomalies, 0);
    }

    #[test]
    fn both_roles_make_progress_until_stopped() {
        const WINDOWS: usize = 4;
        const WINDOW: Duration = Duration::from_millis(150);

        let config = quick(3, 3).with_capacity(2);
        let simulation = Simulation::from_config(&config).unwrap();
        let monitor = Arc::clone(simulation.monitor());
        let stop = simulation.stop_handle();

        // Every window must catch each role inside at least once.
        for window in 0..WINDOWS {
            let mut seen = [false; 2];
            let until = Instant::now() + WINDOW;
            while Instant::now() < until {
                let inside = monitor.occupancy();
                for role in Role::ALL {
                    seen[role.index()] |= inside.count(role) > 0;
                }
                std::thread::sleep(Duration::from_micros(200));
            }
            for role in Role::ALL {
                assert!(seen[role.index()], "{role} stalled in window {window}");
            }
        }
        stop.stop();
        assert!(stop.is_stopped());

        let report = simulation.join().unwrap();
        let (goths, hipsters) = (report.goths.admissions, report.hipsters.admissions);
        assert!(goths > 0 && hipsters > 0, "a role starved: {report:?}");
        assert!(
            goths.min(hipsters) * 2 >= goths.max(hipsters),
            "unbalanced admissions: {report:?}"
        );
        assert_eq!(report.anomalies, 0);
        assert!(report.final_occupancy.is_empty());
    }

    #[test]
    fn stop_releases_occupants_waiting_at_the_door() {
        let monitor = Arc::new(AdmissionMonitor::new(1).unwrap());
        // Hold the room so every occupant blocks at the door.
        monitor.enter(Role::Goth);

        let config = quick(2, 2).with_capacity(1);
        let simulation = Simulation::start(Arc::clone(&monitor), &config).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!simulation.is_finished());

        let started = Instant::now();
        simulation.stop_handle().stop();
        let report = simulation.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.total_admissions(), 0);
        assert_eq!(report.final_occupancy, Occupancy::new(1, 0));

        monitor.exit(Role::Goth);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimConfig::default().with_occupants(0, 0).with_capacity(1);
        assert!(matches!(
            Simulation::from_config(&config),
            Err(SimError::Config(ConfigError::NoOccupants))
        ));
    }

    #[test]
    fn random_dwell_stays_within_bound() {
        let mut rng = rand::thread_rng();
        let max = Duration::from_millis(3);
        for _ in 0..100 {
            assert!(random_dwell(&mut rng, max) <= max);
        }
        assert_eq!(random_dwell(&mut rng, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn report_serializes() {
        let mut report = RunReport::default();
        let goth = Occupant::new(Role::Goth, 0);
        report.absorb(&OccupantLog {
            occupant: goth,
            admissions: 4,
            peak: 2,
            samples: 4,
            anomalies: 0,
        });
        insta::assert_json_snapshot!(report, @r#"
        {
          "goths": {
            "occupants": 1,
            "admissions": 4,
            "peak": 2
          },
          "hipsters": {
            "occupants": 0,
            "admissions": 0,
            "peak": 0
          },
          "samples": 4,
          "anomalies": 0,
          "final_occupancy": {
            "goths": 0,
            "hipsters": 0
          }
        }
        "#);
    }

    #[tokio::test]
    async fn stop_from_async_context() {
        let config = quick(2, 2);
        let simulation = Simulation::from_config(&config).unwrap();
        let stop = simulation.stop_handle();
        let token = stop.token();

        let join = tokio::task::spawn_blocking(move || simulation.join());
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
        token.cancelled().await;

        let report = join.await.unwrap().unwrap();
        assert_eq!(report.anomalies, 0);
        assert!(report.final_occupancy.is_empty());
    }
}
