//! Simulation configuration.

use std::time::Duration;

use serde::Serialize;

use crate::role::Role;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    #[error("at least one occupant is required")]
    NoOccupants,
    #[error("iterations must be at least 1 when bounded")]
    ZeroIterations,
}

/// How many occupants of each role to run, and how they behave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimConfig {
    pub goths: usize,
    pub hipsters: usize,
    /// Room capacity per role.
    pub capacity: usize,
    /// Upper bound of the random dwell inside the room (inclusive).
    #[serde(rename = "max_dwell_ms", with = "millis")]
    pub max_dwell: Duration,
    /// Visits per occupant. `None` loops until stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            goths: 3,
            hipsters: 3,
            capacity: 6,
            max_dwell: Duration::from_secs(2),
            iterations: None,
        }
    }
}

impl SimConfig {
    pub fn occupants(&self, role: Role) -> usize {
        match role {
            Role::Goth => self.goths,
            Role::Hipster => self.hipsters,
        }
    }

    /// Set both role counts, keeping the capacity at their sum.
    pub fn with_occupants(mut self, goths: usize, hipsters: usize) -> Self {
        self.goths = goths;
        self.hipsters = hipsters;
        self.capacity = goths + hipsters;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_max_dwell(mut self, max_dwell: Duration) -> Self {
        self.max_dwell = max_dwell;
        self
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.goths + self.hipsters == 0 {
            return Err(ConfigError::NoOccupants);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_scenario() {
        let config = SimConfig::default();
        assert_eq!(config.occupants(Role::Goth), 3);
        assert_eq!(config.occupants(Role::Hipster), 3);
        assert_eq!(config.capacity, config.goths + config.hipsters);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = SimConfig::default()
            .with_occupants(2, 1)
            .with_max_dwell(Duration::from_millis(5))
            .with_iterations(10);

        assert_eq!(config.capacity, 3);
        assert_eq!(config.max_dwell, Duration::from_millis(5));
        assert_eq!(config.iterations, Some(10));

        let config = config.with_capacity(1);
        assert_eq!(config.capacity, 1);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert_eq!(
            SimConfig::default().with_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            SimConfig::default().with_occupants(0, 0).validate(),
            Err(ConfigError::NoOccupants)
        );
        assert_eq!(
            SimConfig::default()
                .with_occupants(0, 0)
                .with_capacity(1)
                .validate(),
            Err(ConfigError::NoOccupants)
        );
        assert_eq!(
            SimConfig::default().with_iterations(0).validate(),
            Err(ConfigError::ZeroIterations)
        );
    }

    #[test]
    fn config_serializes_dwell_as_millis() {
        insta::assert_json_snapshot!(SimConfig::default(), @r#"
        {
          "goths": 3,
          "hipsters": 3,
          "capacity": 6,
          "max_dwell_ms": 2000
        }
        "#);
    }

    #[test]
    fn config_serializes_bounded_iterations() {
        let config = SimConfig::default()
            .with_occupants(1, 1)
            .with_max_dwell(Duration::ZERO)
            .with_iterations(500);
        insta::assert_json_snapshot!(config, @r#"
        {
          "goths": 1,
          "hipsters": 1,
          "capacity": 2,
          "max_dwell_ms": 0,
          "iterations": 500
        }
        "#);
    }

    #[test]
    fn oversized_dwell_saturates() {
        let config = SimConfig::default().with_max_dwell(Duration::MAX);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_dwell_ms"], u64::MAX);
    }
}
