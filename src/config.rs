use crate::error::{SimulationError, SimulationResult};
use serde::{Deserialize, Serialize};

/// The settings of a [crate::Simulation].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// The time step in s.
    pub dt: f64,
    /// The default RSU lookahead of new vehicles in m.
    pub rsu_range: f64,
    /// The maximum distance searched for neighbouring vehicles in m.
    pub max_search_distance: f64,
    /// Whether new vehicles record a trajectory.
    pub record_trajectories: bool,
    /// The sampling period of trajectories in s.
    pub trajectory_period: f64,
    /// The seed of the simulation's random stream.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.5,
            rsu_range: 300.0,
            max_search_distance: 300.0,
            record_trajectories: false,
            trajectory_period: 1.0,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Parses a configuration from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> SimulationResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| SimulationError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> SimulationResult<()> {
        let positive = [
            ("dt", self.dt),
            ("trajectory_period", self.trajectory_period),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SimulationError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let non_negative = [
            ("rsu_range", self.rsu_range),
            ("max_search_distance", self.max_search_distance),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(SimulationError::Config(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
