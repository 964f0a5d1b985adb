#![allow(non_snake_case)]

use prelude::*;
use serde::{Deserialize, Serialize};

mod kinematic_bicycle;
pub use kinematic_bicycle::KinematicBicycle;

/// Number of state variables per horizon stage.
pub const NS: usize = 6;
/// Number of actuator variables per horizon interval.
pub const NI: usize = 2;

/// Vehicle state relative to the reference curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub x: float,
    pub y: float,
    /// Heading, counter-clockwise positive.
    pub psi: float,
    pub v: float,
    /// Cross track error, `curve(x) - y`.
    pub cte: float,
    /// Heading error, `psi - desired_psi(x)`.
    pub epsi: float,
}

impl State {
    pub fn to_array(&self) -> [float; NS] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    pub fn from_array(a: [float; NS]) -> State {
        let [x, y, psi, v, cte, epsi] = a;
        State {
            x,
            y,
            psi,
            v,
            cte,
            epsi,
        }
    }

    pub fn is_finite(&self) -> bool {
        all_finite(&self.to_array())
    }
}

/// Actuator values held over one horizon interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    /// Steering angle in radians, positive turns right.
    pub delta: float,
    /// Normalised acceleration, negative brakes.
    pub a: float,
}

impl Actuator {
    pub fn to_array(&self) -> [float; NI] {
        [self.delta, self.a]
    }

    pub fn from_array(a: [float; NI]) -> Actuator {
        Actuator {
            delta: a[0],
            a: a[1],
        }
    }
}
