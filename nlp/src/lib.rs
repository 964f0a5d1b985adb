//! Sparse nonlinear program solver.
//!
//! Solves
//!
//! ```text
//! min  sum_k r_k(x)^2
//! s.t. g_l <= g(x) <= g_u
//!      x_l <= x    <= x_u
//! ```
//!
//! by sequential quadratic programming. Each iteration linearises the cost terms and constraints
//! around the current iterate, solves the resulting QP with OSQP and takes a step that decreases
//! an l1 merit function.

#![allow(non_snake_case)]

#[macro_use]
extern crate log;

use prelude::*;
use std::time::Duration;

mod bounds;
pub use bounds::Bounds;

mod sqp;
pub use sqp::solve;

/// Supplies function values and first derivatives of a nonlinear program.
///
/// The objective is the sum of squares of the cost terms so the solver can build a positive
/// semi-definite Gauss-Newton model of it from first derivatives alone.
pub trait Evaluator {
    fn n_vars(&self) -> usize;

    fn n_constraints(&self) -> usize;

    fn n_cost_terms(&self) -> usize;

    /// Writes every cost term `r_k(x)` into `terms`.
    fn cost_terms(&self, x: &[float], terms: &mut [float]);

    /// Pushes the non-zero pattern and values of `d r / d x` into `jac`.
    ///
    /// The pattern must not depend on `x`: entries that happen to be zero are still pushed.
    fn cost_terms_jacobian(&self, x: &[float], jac: &mut sparse::Builder);

    /// Writes every constraint function value `g_i(x)` into `g`.
    fn constraints(&self, x: &[float], g: &mut [float]);

    /// Pushes the non-zero pattern and values of `d g / d x` into `jac`.
    fn constraints_jacobian(&self, x: &[float], jac: &mut sparse::Builder);

    fn objective(&self, x: &[float]) -> float {
        let mut terms = vec![0.0; self.n_cost_terms()];
        self.cost_terms(x, &mut terms);
        sum_of_squares(&terms)
    }
}

pub fn sum_of_squares(terms: &[float]) -> float {
    terms.iter().map(|r| r * r).sum()
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Wall clock budget for a single solve.
    pub max_time: Duration,
    pub max_iter: u32,
    /// Relative step size below which a feasible iterate is considered converged.
    pub tol: float,
    /// Relative merit change below which a feasible iterate is considered converged.
    pub obj_tol: float,
    /// Largest constraint or bound violation of a converged iterate.
    pub constr_viol_tol: float,
    pub acceptable_constr_viol_tol: float,
    pub acceptable_obj_change_tol: float,
    /// Number of consecutive acceptable iterations before stopping early.
    pub acceptable_iter: u32,
    /// Bounds at or beyond this magnitude are treated as infinite.
    pub bound_inf: float,
    /// Diagonal added to the Gauss-Newton hessian.
    pub regularisation: float,
    /// Absolute and relative tolerance of each QP sub-problem.
    pub qp_eps: float,
    pub qp_max_iter: u32,
    /// 0 logs iterations at debug level, 1 at info level, 2 also enables OSQP output when debug
    /// logging is enabled.
    pub print_level: u32,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            max_time: Duration::from_millis(500),
            max_iter: 100,
            tol: 1e-6,
            obj_tol: 1e-9,
            constr_viol_tol: 1e-4,
            acceptable_constr_viol_tol: 1e-2,
            acceptable_obj_change_tol: 1e-6,
            acceptable_iter: 15,
            bound_inf: 1e19,
            regularisation: 1e-6,
            qp_eps: 1e-7,
            qp_max_iter: 4000,
            print_level: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Solved,
    SolvedToAcceptableLevel,
    MaxIterationsReached,
    TimeLimitReached,
    /// No step could reduce the constraint violation.
    LocalInfeasibility,
    /// The iterate is feasible but no step along the QP direction decreased the merit function.
    LineSearchFailed,
    /// OSQP could not set up or solve a QP sub-problem.
    QpFailure,
    /// An evaluation produced NaN or infinity, or the inputs contained NaN.
    NonFiniteValue,
}

impl Status {
    pub fn is_success(self) -> bool {
        match self {
            Status::Solved | Status::SolvedToAcceptableLevel => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SolveResult {
    pub status: Status,
    pub obj_value: float,
    /// Final iterate, in the same layout as the initial guess.
    pub x: Vec<float>,
    pub iterations: u32,
    /// Largest constraint violation at `x`.
    pub constraint_violation: float,
}

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("{what} has length {got} but the problem expects {expected}")]
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
}
