#![allow(non_snake_case)]

//! Reference path handling: moving waypoints into the vehicle frame and fitting a cubic to them.

#[macro_use]
extern crate log;

mod polyfit;
pub use polyfit::{fit, FitError, DEGREE, MIN_POINTS};

mod transform;
pub use transform::{to_vehicle_frame, to_world_frame, Point, Pose};

use prelude::*;
use serde::{Deserialize, Serialize};

/// Cubic `y = c0 + c1 x + c2 x^2 + c3 x^3` in the vehicle frame.
///
/// This is the only place the curve and its derivatives are evaluated. Both the initial state
/// estimate and the dynamics constraints go through it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCurve {
    /// Lowest degree first.
    pub coeffs: [float; 4],
}

impl ReferenceCurve {
    pub fn new(coeffs: [float; 4]) -> ReferenceCurve {
        ReferenceCurve { coeffs }
    }

    pub fn straight() -> ReferenceCurve {
        ReferenceCurve::default()
    }

    pub fn eval(&self, x: float) -> float {
        let [c0, c1, c2, c3] = self.coeffs;
        c0 + c1 * x + c2 * (x * x) + c3 * (x * x * x)
    }

    pub fn derivative(&self, x: float) -> float {
        let [_, c1, c2, c3] = self.coeffs;
        c1 + 2.0 * c2 * x + 3.0 * c3 * (x * x)
    }

    pub fn second_derivative(&self, x: float) -> float {
        let [_, _, c2, c3] = self.coeffs;
        2.0 * c2 + 6.0 * c3 * x
    }

    /// Heading of the curve's tangent at `x`.
    pub fn desired_psi(&self, x: float) -> float {
        self.derivative(x).atan()
    }

    /// Derivative of `desired_psi` with respect to `x`.
    pub fn desired_psi_derivative(&self, x: float) -> float {
        let d = self.derivative(x);
        self.second_derivative(x) / (1.0 + d * d)
    }

    pub fn is_finite(&self) -> bool {
        all_finite(&self.coeffs)
    }
}
