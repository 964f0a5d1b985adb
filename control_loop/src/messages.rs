use serde::{Deserialize, Serialize};

use prelude::*;
use track::{Point, Pose};

use crate::CycleError;

/// Vehicle telemetry received once per control cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Reference waypoints in the world frame.
    pub ptsx: Vec<float>,
    pub ptsy: Vec<float>,
    pub x: float,
    pub y: float,
    pub psi: float,
    pub speed: float,
}

impl Telemetry {
    pub fn validate(&self) -> Result<(), CycleError> {
        if self.ptsx.len() != self.ptsy.len() {
            return Err(CycleError::InvalidTelemetry(format!(
                "{} x coordinates but {} y coordinates",
                self.ptsx.len(),
                self.ptsy.len()
            )));
        }
        if !all_finite(&[self.x, self.y, self.psi, self.speed]) {
            return Err(CycleError::InvalidTelemetry(
                "non-finite vehicle pose or speed".to_string(),
            ));
        }
        if !all_finite(&self.ptsx) || !all_finite(&self.ptsy) {
            return Err(CycleError::InvalidTelemetry(
                "non-finite waypoint".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pose(&self) -> Pose {
        Pose {
            x: self.x,
            y: self.y,
            psi: self.psi,
        }
    }

    pub fn waypoints(&self) -> Vec<Point> {
        self.ptsx
            .iter()
            .zip(&self.ptsy)
            .map(|(&x, &y)| Point { x, y })
            .collect()
    }
}

/// Command sent back to the vehicle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Steering in `[-1, 1]` of the steering range, positive turns right.
    pub steering_angle: float,
    pub throttle: float,
    /// Predicted trajectory in the vehicle frame.
    pub mpc_x: Vec<float>,
    pub mpc_y: Vec<float>,
    /// Reference waypoints in the vehicle frame.
    pub next_x: Vec<float>,
    pub next_y: Vec<float>,
}

impl Command {
    /// A command without any trajectory to display.
    pub fn actuation(steering_angle: float, throttle: float) -> Command {
        Command {
            steering_angle,
            throttle,
            ..Command::default()
        }
    }
}
