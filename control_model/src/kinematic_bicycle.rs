// Kinematic bicycle model, Euler discretised, with the cross track and heading errors relative to
// a reference curve carried as extra states.

use prelude::nalgebra::{Matrix6, Matrix6x2};
use prelude::*;
use track::ReferenceCurve;

use crate::{Actuator, State};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicBicycle {
    /// Distance from the front axle to the centre of gravity.
    Lf: float,
}

impl KinematicBicycle {
    pub fn new(Lf: float) -> KinematicBicycle {
        assert!(Lf > 0.0, "Lf must be positive");
        KinematicBicycle { Lf }
    }

    /// Rate of change of heading per unit steering angle at speed `v`.
    fn yaw_gain(&self, v: float) -> float {
        v / self.Lf
    }

    /// Advances position, heading and speed by one step. The error states are left unchanged.
    pub fn step_kinematics(&self, dt: float, s: &State, u: &Actuator) -> State {
        State {
            x: s.x + s.v * s.psi.cos() * dt,
            y: s.y + s.v * s.psi.sin() * dt,
            psi: s.psi - self.yaw_gain(s.v) * u.delta * dt,
            v: s.v + u.a * dt,
            cte: s.cte,
            epsi: s.epsi,
        }
    }

    /// Advances the full state by one step.
    ///
    /// The errors at the next stage are the errors of the current position and heading against
    /// `curve`, moved on by the lateral drift and yaw over `dt`.
    pub fn step(&self, dt: float, s: &State, u: &Actuator, curve: &ReferenceCurve) -> State {
        let mut next = self.step_kinematics(dt, s, u);
        next.cte = (curve.eval(s.x) - s.y) - s.v * s.epsi.sin() * dt;
        next.epsi = (s.psi - curve.desired_psi(s.x)) - self.yaw_gain(s.v) * u.delta * dt;
        next
    }

    /// Returns the jacobian of `step` with respect to the state and the actuators.
    pub fn linearise(
        &self,
        dt: float,
        s: &State,
        u: &Actuator,
        curve: &ReferenceCurve,
    ) -> (Matrix6<float>, Matrix6x2<float>) {
        let (sin_psi, cos_psi) = s.psi.sin_cos();
        let (sin_epsi, cos_epsi) = s.epsi.sin_cos();
        let v = s.v;
        let k = dt / self.Lf;
        let df = curve.derivative(s.x);
        let dpsi_des = curve.desired_psi_derivative(s.x);

        #[rustfmt::skip]
        let A = Matrix6::new(
            1.0, 0.0, -v * sin_psi * dt, cos_psi * dt, 0.0, 0.0,
            0.0, 1.0, v * cos_psi * dt, sin_psi * dt, 0.0, 0.0,
            0.0, 0.0, 1.0, -u.delta * k, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
            df, -1.0, 0.0, -sin_epsi * dt, 0.0, -v * cos_epsi * dt,
            -dpsi_des, 0.0, 1.0, -u.delta * k, 0.0, 0.0,
        );

        #[rustfmt::skip]
        let B = Matrix6x2::new(
            0.0, 0.0,
            0.0, 0.0,
            -v * k, 0.0,
            0.0, dt,
            0.0, 0.0,
            -v * k, 0.0,
        );

        (A, B)
    }

    /// Returns two boolean matrices with true everywhere A and B could contain a non-zero value.
    pub fn linearise_sparsity(&self) -> (Matrix6<bool>, Matrix6x2<bool>) {
        #[rustfmt::skip]
        let A_mask = Matrix6::new(
            true, false, true, true, false, false,
            false, true, true, true, false, false,
            false, false, true, true, false, false,
            false, false, false, true, false, false,
            true, true, false, true, false, true,
            true, false, true, true, false, false,
        );

        #[rustfmt::skip]
        let B_mask = Matrix6x2::new(
            false, false,
            false, false,
            true, false,
            false, true,
            false, false,
            true, false,
        );

        (A_mask, B_mask)
    }
}
