use control_model::State;
use nlp::{SolveResult, Status};
use prelude::*;

use crate::{MpcConfig, MpcError, MpcProblem, VariableLayout};

/// Actuators further than this outside their bounds after a solve are reported.
const CLAMP_WARN: float = 1e-2;

/// Solves `problem` from the zero actuation rollout of `initial`.
///
/// A solve that does not finish with a success status is an error: its trajectory is not used.
pub fn solve(
    problem: &MpcProblem,
    initial: &State,
    config: &MpcConfig,
) -> Result<SolveResult, MpcError> {
    let x0 = problem.initial_guess(initial);
    let var_bounds = problem.variable_bounds(config);
    let con_bounds = problem.constraint_bounds(initial);

    let mut result = nlp::solve(
        problem,
        &x0,
        &var_bounds,
        &con_bounds,
        &config.solver.settings(),
    )?;

    debug!(
        "solver finished with {:?} after {} iterations (objective {:.4e}, violation {:.3e})",
        result.status, result.iterations, result.obj_value, result.constraint_violation
    );

    if !result.status.is_success() {
        return Err(MpcError::Solver(result.status));
    }
    if !all_finite(&result.x) || !result.obj_value.is_finite() {
        return Err(MpcError::Solver(Status::NonFiniteValue));
    }

    let clamped = clamp_actuators(problem.layout(), &var_bounds, &mut result.x);
    if clamped > CLAMP_WARN {
        warn!("actuators were {:.3e} outside their bounds", clamped);
    }

    Ok(result)
}

/// Clamps the actuator part of `x` into `bounds`. Returns the largest correction made.
fn clamp_actuators(layout: &VariableLayout, bounds: &nlp::Bounds, x: &mut [float]) -> float {
    let start = layout.actuator_start(VariableLayout::DELTA);
    let mut largest: float = 0.0;
    for i in start..layout.n_vars() {
        let c = clamp(x[i], bounds.lower[i], bounds.upper[i]);
        largest = max(largest, (c - x[i]).abs());
        x[i] = c;
    }
    largest
}
