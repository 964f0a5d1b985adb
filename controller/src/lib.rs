#![allow(non_snake_case)]

//! Receding horizon controller for a kinematic bicycle following a cubic reference curve.

#[macro_use]
extern crate log;

use control_model::{KinematicBicycle, State};
use prelude::*;
use track::ReferenceCurve;

mod config;
pub use config::{ActuatorBounds, CommandPolicy, CostWeights, MpcConfig, SolverConfig};

mod horizon;
pub use horizon::{Horizon, VariableLayout};

mod problem;
pub use problem::MpcProblem;

mod result;
pub use result::Prediction;

mod solver;

mod state_estimator;
pub use state_estimator::estimate as estimate_state;

#[derive(Debug, thiserror::Error)]
pub enum MpcError {
    #[error("invalid controller configuration: {0}")]
    InvalidConfig(String),
    #[error("non-finite value in the initial state or reference curve")]
    NonFiniteInput,
    #[error("solver did not converge: {0:?}")]
    Solver(nlp::Status),
    #[error(transparent)]
    Problem(#[from] nlp::SolveError),
}

/// Outcome of one successful solve.
#[derive(Clone, Debug)]
pub struct MpcResult {
    /// Objective value of the solution.
    pub cost: float,
    /// Cross track error predicted for the next stage.
    pub cte: float,
    pub status: nlp::Status,
    pub iterations: u32,
    /// Predicted trajectory in the vehicle frame, stages `1..N`.
    pub predicted_xs: Vec<float>,
    pub predicted_ys: Vec<float>,
    pub predicted_steering_angles: Vec<float>,
    pub predicted_throttles: Vec<float>,
    /// Steering angle to apply now, in radians.
    pub steering_angle: float,
    /// Acceleration to apply now.
    pub throttle: float,
}

pub struct Mpc {
    config: MpcConfig,
    model: KinematicBicycle,
}

impl Mpc {
    pub fn new(config: MpcConfig) -> Result<Mpc, MpcError> {
        config.validate().map_err(MpcError::InvalidConfig)?;
        let model = KinematicBicycle::new(config.Lf);
        Ok(Mpc { config, model })
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    /// Plans over the horizon from `initial` and returns the command for the current cycle.
    pub fn solve(&self, initial: &State, curve: &ReferenceCurve) -> Result<MpcResult, MpcError> {
        let _guard = flame::start_guard("mpc solve");

        if !initial.is_finite() || !curve.is_finite() {
            return Err(MpcError::NonFiniteInput);
        }

        let problem = flame::span_of("mpc problem build", || {
            MpcProblem::new(&self.config, *curve)
        });
        let solution = solver::solve(&problem, initial, &self.config)?;

        let guard = flame::start_guard("mpc result processing");
        let layout = problem.layout();
        let mut prediction = Prediction::from_solution(layout, &solution.x);
        prediction.smooth(
            self.config.smoothing_window,
            layout,
            &solution.x,
            &self.model,
            self.config.horizon.dt,
        );
        let command = prediction.command(self.config.command_policy);
        guard.end();

        Ok(MpcResult {
            cost: solution.obj_value,
            cte: prediction.cte,
            status: solution.status,
            iterations: solution.iterations,
            predicted_xs: prediction.xs,
            predicted_ys: prediction.ys,
            predicted_steering_angles: prediction.steering,
            predicted_throttles: prediction.throttle,
            steering_angle: command.delta,
            throttle: command.a,
        })
    }
}
