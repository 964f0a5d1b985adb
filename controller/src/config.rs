use serde::{Deserialize, Serialize};
use std::time::Duration;

use prelude::*;
use crate::Horizon;

/// Weight of each squared term of the cost.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub cte: float,
    /// Product of cross track error and steering angle.
    pub cte_steering: float,
    pub epsi: float,
    /// Difference from the reference speed.
    pub speed: float,
    pub steering: float,
    pub acceleration: float,
    /// Product of acceleration and steering angle.
    pub acceleration_steering: float,
    /// Change in steering angle between consecutive intervals.
    pub steering_rate: float,
    /// Change in acceleration between consecutive intervals.
    pub acceleration_rate: float,
}

impl Default for CostWeights {
    fn default() -> CostWeights {
        CostWeights {
            cte: 1000.0,
            cte_steering: 10000.0,
            epsi: 10000.0,
            speed: 10.0,
            steering: 10.0,
            acceleration: 100.0,
            acceleration_steering: 100.0,
            steering_rate: 10.0,
            acceleration_rate: 10.0,
        }
    }
}

impl CostWeights {
    fn as_array(&self) -> [float; 9] {
        [
            self.cte,
            self.cte_steering,
            self.epsi,
            self.speed,
            self.steering,
            self.acceleration,
            self.acceleration_steering,
            self.steering_rate,
            self.acceleration_rate,
        ]
    }

    /// Square roots of the weights, which scale the residuals handed to the solver.
    pub fn sqrt(&self) -> CostWeights {
        CostWeights {
            cte: self.cte.sqrt(),
            cte_steering: self.cte_steering.sqrt(),
            epsi: self.epsi.sqrt(),
            speed: self.speed.sqrt(),
            steering: self.steering.sqrt(),
            acceleration: self.acceleration.sqrt(),
            acceleration_steering: self.acceleration_steering.sqrt(),
            steering_rate: self.steering_rate.sqrt(),
            acceleration_rate: self.acceleration_rate.sqrt(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorBounds {
    /// Steering is bounded to `[-steering_max, steering_max]` radians.
    pub steering_max: float,
    pub acceleration_min: float,
    pub acceleration_max: float,
    /// Magnitude used as the bound of every state variable.
    pub state_limit: float,
}

impl Default for ActuatorBounds {
    fn default() -> ActuatorBounds {
        ActuatorBounds {
            steering_max: 0.436332,
            acceleration_min: -1.0,
            acceleration_max: 0.75,
            state_limit: 1.0e19,
        }
    }
}

/// How the emitted command is taken from the predicted actuator sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandPolicy {
    /// First interval of the smoothed sequence.
    FirstSample,
    /// Mean of the first `samples` intervals of the smoothed sequence.
    WindowedAverage { samples: usize },
}

impl Default for CommandPolicy {
    fn default() -> CommandPolicy {
        CommandPolicy::FirstSample
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall clock budget per solve in seconds.
    pub max_time: float,
    pub max_iter: u32,
    pub print_level: u32,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            max_time: 0.5,
            max_iter: 100,
            print_level: 0,
        }
    }
}

impl SolverConfig {
    pub fn settings(&self) -> nlp::Settings {
        nlp::Settings {
            max_time: Duration::from_secs_f64(self.max_time),
            max_iter: self.max_iter,
            print_level: self.print_level,
            ..nlp::Settings::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcConfig {
    pub horizon: Horizon,
    /// Distance from the front axle to the centre of gravity in metres.
    pub Lf: float,
    /// Target speed in metres per second.
    pub ref_v: float,
    pub weights: CostWeights,
    pub bounds: ActuatorBounds,
    /// Width of the moving average applied to the predicted actuators. 1 disables smoothing.
    pub smoothing_window: usize,
    pub command_policy: CommandPolicy,
    pub solver: SolverConfig,
}

impl Default for MpcConfig {
    fn default() -> MpcConfig {
        MpcConfig {
            horizon: Horizon::default(),
            Lf: 2.67,
            ref_v: mph_to_mps(70.0),
            weights: CostWeights::default(),
            bounds: ActuatorBounds::default(),
            smoothing_window: 7,
            command_policy: CommandPolicy::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl MpcConfig {
    /// Checks the values are usable, returning a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let h = &self.horizon;
        if h.N < 2 {
            return Err(format!("horizon.N must be at least 2, got {}", h.N));
        }
        if !(h.dt > 0.0) || !h.dt.is_finite() {
            return Err(format!("horizon.dt must be positive, got {}", h.dt));
        }
        if !(self.Lf > 0.0) || !self.Lf.is_finite() {
            return Err(format!("Lf must be positive, got {}", self.Lf));
        }
        if !self.ref_v.is_finite() {
            return Err("ref_v must be finite".to_string());
        }
        if self
            .weights
            .as_array()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err("cost weights must be finite and non-negative".to_string());
        }

        let b = &self.bounds;
        if !(b.steering_max > 0.0) || !b.steering_max.is_finite() {
            return Err(format!(
                "bounds.steering_max must be positive, got {}",
                b.steering_max
            ));
        }
        if !(b.acceleration_min <= b.acceleration_max)
            || !b.acceleration_min.is_finite()
            || !b.acceleration_max.is_finite()
        {
            return Err(format!(
                "acceleration bounds [{}, {}] are not an interval",
                b.acceleration_min, b.acceleration_max
            ));
        }
        if !(b.state_limit > 0.0) {
            return Err(format!(
                "bounds.state_limit must be positive, got {}",
                b.state_limit
            ));
        }

        if self.smoothing_window < 1 {
            return Err("smoothing_window must be at least 1".to_string());
        }
        if let CommandPolicy::WindowedAverage { samples } = self.command_policy {
            if samples < 1 || samples > h.N - 1 {
                return Err(format!(
                    "command_policy.samples must be in [1, {}], got {}",
                    h.N - 1,
                    samples
                ));
            }
        }
        if !(self.solver.max_time > 0.0) || !self.solver.max_time.is_finite() {
            return Err(format!(
                "solver.max_time must be positive, got {}",
                self.solver.max_time
            ));
        }
        Ok(())
    }
}
