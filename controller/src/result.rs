use control_model::{Actuator, KinematicBicycle};
use prelude::*;

use crate::{CommandPolicy, VariableLayout};

/// Trajectory and actuator sequence predicted by a solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Positions of stages `1..N` in the vehicle frame.
    pub xs: Vec<float>,
    pub ys: Vec<float>,
    /// Actuators for intervals `0..N-1`. Interval `i` leads into stage `i + 1`.
    pub steering: Vec<float>,
    pub throttle: Vec<float>,
    /// Cross track error predicted for stage 1.
    pub cte: float,
}

impl Prediction {
    pub fn from_solution(layout: &VariableLayout, solution: &[float]) -> Prediction {
        Prediction {
            xs: layout.states(solution, VariableLayout::X)[1..].to_vec(),
            ys: layout.states(solution, VariableLayout::Y)[1..].to_vec(),
            steering: layout.actuators(solution, VariableLayout::DELTA).to_vec(),
            throttle: layout.actuators(solution, VariableLayout::A).to_vec(),
            cte: solution[layout.state_index(VariableLayout::CTE, 1)],
        }
    }

    /// Replaces each actuator that has a full window ahead of it by the mean over
    /// `[i, i + window)`, then moves the affected stages so the trajectory follows the smoothed
    /// actuators.
    ///
    /// Each re-integrated stage starts from the stage before it, itself re-integrated if it was
    /// smoothed. Speed and heading advance with the smoothed actuators and position advances
    /// with the new speed and heading.
    pub fn smooth(
        &mut self,
        window: usize,
        layout: &VariableLayout,
        solution: &[float],
        model: &KinematicBicycle,
        dt: float,
    ) {
        let n = self.steering.len();
        if window <= 1 || window > n {
            return;
        }

        let mut prev = layout.state(solution, 0);
        for i in 0..=n - window {
            self.steering[i] = mean(&self.steering[i..i + window]);
            self.throttle[i] = mean(&self.throttle[i..i + window]);

            let u = Actuator {
                delta: self.steering[i],
                a: self.throttle[i],
            };
            let mut next = model.step_kinematics(dt, &prev, &u);
            next.x = prev.x + next.v * next.psi.cos() * dt;
            next.y = prev.y + next.v * next.psi.sin() * dt;

            self.xs[i] = next.x;
            self.ys[i] = next.y;
            prev = next;
        }
    }

    /// The actuator values to apply now.
    pub fn command(&self, policy: CommandPolicy) -> Actuator {
        match policy {
            CommandPolicy::FirstSample => Actuator {
                delta: self.steering[0],
                a: self.throttle[0],
            },
            CommandPolicy::WindowedAverage { samples } => {
                let k = samples.max(1).min(self.steering.len());
                Actuator {
                    delta: mean(&self.steering[..k]),
                    a: mean(&self.throttle[..k]),
                }
            }
        }
    }
}

fn mean(values: &[float]) -> float {
    values.iter().sum::<float>() / values.len() as float
}
