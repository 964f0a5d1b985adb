use serde::Deserialize;
use std::fs::read_to_string;

use prelude::*;

static CONFIG_FILE: &str = "simulator.toml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulated duration in seconds.
    pub t: float,
    /// Time between telemetry messages in seconds.
    pub control_dt: float,
    /// Integration steps per control interval.
    pub substeps: u32,
    /// Sleep so each control interval takes at least `control_dt` of wall clock time.
    pub real_time: bool,
    pub initial_speed: float,
    /// Number of upcoming waypoints sent with each telemetry message.
    pub lookahead: usize,
    pub reference: ReferenceConfig,
    pub noise: NoiseConfig,
    pub controller_config: String,
    /// Where to write a flame graph of the run, if anywhere.
    pub flame_graph: Option<String>,
}

impl Default for SimulatorConfig {
    fn default() -> SimulatorConfig {
        SimulatorConfig {
            t: 60.0,
            control_dt: 0.1,
            substeps: 10,
            real_time: false,
            initial_speed: 10.0,
            lookahead: 6,
            reference: ReferenceConfig::default(),
            noise: NoiseConfig::default(),
            controller_config: control_loop::CONFIG_FILE.to_string(),
            flame_graph: None,
        }
    }
}

/// Closed reference loop: an ellipse with a lobed perturbation of its radius.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub radius_x: float,
    pub radius_y: float,
    /// Relative amplitude of the radius perturbation.
    pub wobble: float,
    pub lobes: u32,
    pub n_waypoints: usize,
}

impl Default for ReferenceConfig {
    fn default() -> ReferenceConfig {
        ReferenceConfig {
            radius_x: 250.0,
            radius_y: 150.0,
            wobble: 0.1,
            lobes: 3,
            n_waypoints: 180,
        }
    }
}

/// Standard deviations of the measurement noise.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub position: float,
    pub heading: float,
    pub speed: float,
}

impl Default for NoiseConfig {
    fn default() -> NoiseConfig {
        NoiseConfig {
            position: 0.05,
            heading: 0.005,
            speed: 0.05,
        }
    }
}

impl SimulatorConfig {
    pub fn load() -> SimulatorConfig {
        let config_str = read_to_string(CONFIG_FILE).expect("unable to read simulator.toml");
        let config: SimulatorConfig =
            toml::from_str(&config_str[..]).expect("unable to deserialise simulator.toml");
        assert!(config.control_dt > 0.0, "control_dt must be positive");
        assert!(config.substeps > 0, "substeps must be positive");
        assert!(
            config.lookahead >= track::MIN_POINTS,
            "lookahead must be at least {}",
            track::MIN_POINTS
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_file_parses() {
        let c: SimulatorConfig = toml::from_str(include_str!("../../simulator.toml")).unwrap();
        assert_eq!(c.lookahead, 6);
        assert_eq!(c.reference.lobes, 3);
    }
}
