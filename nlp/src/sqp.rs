use log::Level::Debug;
use osqp_wrapper::{Problem, Status as QpStatus};
use std::time::{Duration, Instant};

use prelude::*;
use crate::{sum_of_squares, Bounds, Evaluator, Settings, SolveError, SolveResult, Status};

/// Armijo sufficient decrease fraction.
const ARMIJO: float = 1e-4;
const MAX_BACKTRACKS: u32 = 30;
/// The merit penalty is kept this much larger than the largest QP multiplier.
const PENALTY_MARGIN: float = 1.1;

/// Minimises the problem described by `eval` starting from `x0`.
///
/// Dimension mismatches are programming errors and are returned as `Err`. Everything that can go
/// wrong numerically is reported through `SolveResult::status`, together with the last iterate.
pub fn solve<E: Evaluator>(
    eval: &E,
    x0: &[float],
    var_bounds: &Bounds,
    con_bounds: &Bounds,
    settings: &Settings,
) -> Result<SolveResult, SolveError> {
    let start = Instant::now();
    let n = eval.n_vars();
    let m = eval.n_constraints();
    let nt = eval.n_cost_terms();

    check_len("initial guess", x0.len(), n)?;
    check_len("variable bounds", var_bounds.len(), n)?;
    check_len("constraint bounds", con_bounds.len(), m)?;

    let mut it = Iterate::new(nt, m);
    it.x.extend_from_slice(x0);

    if !all_finite(x0) || !var_bounds.is_consistent() || !con_bounds.is_consistent() {
        warn!("non-finite initial guess or inconsistent bounds");
        return Ok(it.into_result(Status::NonFiniteValue, 0, con_bounds));
    }

    var_bounds.project(&mut it.x);
    if !it.evaluate(eval) {
        return Ok(it.into_result(Status::NonFiniteValue, 0, con_bounds));
    }

    let mut rho: float = 1.0;
    let mut acceptable_count = 0;
    let mut jac_r = sparse::Builder::with_capacity(nt, n, 2 * nt);
    let mut jac_g = sparse::Builder::with_capacity(m, n, 4 * m);
    let mut x_trial = vec![0.0; n];
    let mut trial = Iterate::new(nt, m);

    for k in 0..settings.max_iter {
        let remaining = match settings
            .max_time
            .checked_sub(start.elapsed())
            .filter(|r| *r > Duration::from_secs(0))
        {
            Some(remaining) => remaining,
            None => return Ok(it.into_result(Status::TimeLimitReached, k, con_bounds)),
        };

        let _guard = flame::start_guard("sqp iteration");

        // Linearise cost terms and constraints around the current iterate
        jac_r.clear();
        jac_g.clear();
        eval.cost_terms_jacobian(&it.x, &mut jac_r);
        eval.constraints_jacobian(&it.x, &mut jac_g);

        let grad: Vec<_> = jac_r
            .transpose_mul_vec(&it.terms)
            .into_iter()
            .map(|v| 2.0 * v)
            .collect();
        if !all_finite(&grad) || !jac_g.coords().iter().all(|c| c.2.is_finite()) {
            warn!("non-finite derivative at iteration {}", k);
            return Ok(it.into_result(Status::NonFiniteValue, k, con_bounds));
        }

        let mut P = jac_r.gram_upper() * 2.0 + sparse::eye(n) * settings.regularisation;
        let mut A = sparse::vstack(&[&jac_g, &sparse::eye(n)]);

        // Step bounds keep the linearised constraints and the variable bounds satisfied
        let mut l = Vec::with_capacity(m + n);
        let mut u = Vec::with_capacity(m + n);
        let inf = settings.bound_inf;
        for i in 0..m {
            l.push(lower_bound(con_bounds.lower[i], inf) - it.g[i]);
            u.push(upper_bound(con_bounds.upper[i], inf) - it.g[i]);
        }
        for i in 0..n {
            l.push(lower_bound(var_bounds.lower[i], inf) - it.x[i]);
            u.push(upper_bound(var_bounds.upper[i], inf) - it.x[i]);
        }

        let qp_settings = osqp_wrapper::Settings::default()
            .verbose(settings.print_level >= 2 && log_enabled!(Debug))
            .eps_abs(settings.qp_eps)
            .eps_rel(settings.qp_eps)
            .max_iter(settings.qp_max_iter)
            .polish(true)
            .time_limit(Some(remaining));

        let (d, y_max) = {
            let mut qp = match Problem::new(&P.build_csc(), &grad, &A.build_csc(), &l, &u, &qp_settings)
            {
                Ok(qp) => qp,
                Err(e) => {
                    warn!("qp setup failed at iteration {}: {:?}", k, e);
                    return Ok(it.into_result(Status::QpFailure, k, con_bounds));
                }
            };
            match qp.solve() {
                QpStatus::Solved(solution)
                | QpStatus::SolvedInaccurate(solution)
                | QpStatus::MaxIterationsReached(solution)
                | QpStatus::TimeLimitReached(solution) => {
                    match step_and_multiplier(solution.x(), &solution.y()[..m]) {
                        Some(step) => step,
                        None => {
                            warn!("non-finite qp solution at iteration {}", k);
                            return Ok(it.into_result(Status::NonFiniteValue, k, con_bounds));
                        }
                    }
                }
                _ => {
                    warn!("qp sub-problem failed at iteration {}", k);
                    return Ok(it.into_result(Status::QpFailure, k, con_bounds));
                }
            }
        };

        rho = max(rho, PENALTY_MARGIN * y_max);
        let merit = it.merit(rho, con_bounds);
        let violation = con_bounds.l1_violation(&it.g);

        // Directional derivative of the l1 merit function along d
        let slope = grad.iter().zip(&d).map(|(g, d)| g * d).sum::<float>() - rho * violation;

        // Backtracking line search
        let mut alpha = 1.0;
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACKS {
            for ((xt, &x), &d) in x_trial.iter_mut().zip(&it.x).zip(&d) {
                *xt = x + alpha * d;
            }
            var_bounds.project(&mut x_trial);
            trial.x.clear();
            trial.x.extend_from_slice(&x_trial);

            if trial.evaluate(eval) {
                let trial_merit = trial.merit(rho, con_bounds);
                let sufficient = if slope < 0.0 {
                    trial_merit <= merit + ARMIJO * alpha * slope
                } else {
                    trial_merit < merit
                };
                if sufficient {
                    accepted = true;
                    break;
                }
            }
            alpha *= 0.5;
        }

        let d_norm = max_abs(&d);
        let step_norm = alpha * d_norm;
        let x_norm = max_abs(&it.x);

        if !accepted {
            let max_violation = con_bounds.max_violation(&it.g);
            debug!(
                "line search failed at iteration {} (violation {:e}, step {:e})",
                k, max_violation, d_norm
            );
            let status = if max_violation <= settings.constr_viol_tol
                && d_norm <= settings.tol * (1.0 + x_norm)
            {
                Status::Solved
            } else if max_violation > settings.constr_viol_tol {
                Status::LocalInfeasibility
            } else {
                Status::LineSearchFailed
            };
            return Ok(it.into_result(status, k + 1, con_bounds));
        }

        let trial_merit = trial.merit(rho, con_bounds);
        let merit_change = (merit - trial_merit).abs() / (1.0 + merit.abs());
        ::std::mem::swap(&mut it, &mut trial);

        let max_violation = con_bounds.max_violation(&it.g);
        let log_level = if settings.print_level > 0 {
            log::Level::Info
        } else {
            Debug
        };
        log!(
            log_level,
            "iter {:3} obj {:.6e} viol {:.3e} step {:.3e} alpha {:.3e} rho {:.3e}",
            k,
            it.objective,
            max_violation,
            step_norm,
            alpha,
            rho
        );

        if max_violation <= settings.constr_viol_tol
            && (step_norm <= settings.tol * (1.0 + x_norm) || merit_change <= settings.obj_tol)
        {
            return Ok(it.into_result(Status::Solved, k + 1, con_bounds));
        }

        if max_violation <= settings.acceptable_constr_viol_tol
            && merit_change <= settings.acceptable_obj_change_tol
        {
            acceptable_count += 1;
            if acceptable_count >= settings.acceptable_iter {
                return Ok(it.into_result(Status::SolvedToAcceptableLevel, k + 1, con_bounds));
            }
        } else {
            acceptable_count = 0;
        }
    }

    Ok(it.into_result(
        Status::MaxIterationsReached,
        settings.max_iter,
        con_bounds,
    ))
}

/// The QP step and the largest constraint multiplier, or `None` if either is not finite.
fn step_and_multiplier(x: &[float], y: &[float]) -> Option<(Vec<float>, float)> {
    if all_finite(x) && all_finite(y) {
        Some((x.to_vec(), max_abs(y)))
    } else {
        None
    }
}

/// Infinity norm of a slice of finite values.
fn max_abs(v: &[float]) -> float {
    v.iter().fold(0.0, |acc: float, &v| max(acc, v.abs()))
}

fn lower_bound(l: float, inf: float) -> float {
    if l <= -inf {
        NEG_INFINITY
    } else {
        l
    }
}

fn upper_bound(u: float, inf: float) -> float {
    if u >= inf {
        INFINITY
    } else {
        u
    }
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<(), SolveError> {
    if got == expected {
        Ok(())
    } else {
        Err(SolveError::DimensionMismatch {
            what,
            got,
            expected,
        })
    }
}

/// A point together with its cost terms and constraint values.
struct Iterate {
    x: Vec<float>,
    terms: Vec<float>,
    g: Vec<float>,
    objective: float,
}

impl Iterate {
    fn new(nt: usize, m: usize) -> Iterate {
        Iterate {
            x: Vec::new(),
            terms: vec![0.0; nt],
            g: vec![0.0; m],
            objective: INFINITY,
        }
    }

    /// Evaluates the problem at `self.x`. Returns false if any value is not finite.
    fn evaluate<E: Evaluator>(&mut self, eval: &E) -> bool {
        eval.cost_terms(&self.x, &mut self.terms);
        eval.constraints(&self.x, &mut self.g);
        self.objective = sum_of_squares(&self.terms);
        self.objective.is_finite() && all_finite(&self.g)
    }

    fn merit(&self, rho: float, con_bounds: &Bounds) -> float {
        self.objective + rho * con_bounds.l1_violation(&self.g)
    }

    fn into_result(self, status: Status, iterations: u32, con_bounds: &Bounds) -> SolveResult {
        let constraint_violation = if all_finite(&self.g) {
            con_bounds.max_violation(&self.g)
        } else {
            INFINITY
        };
        SolveResult {
            status,
            obj_value: self.objective,
            x: self.x,
            iterations,
            constraint_violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Rosenbrock's function written as two squared terms.
    struct Rosenbrock;

    impl Evaluator for Rosenbrock {
        fn n_vars(&self) -> usize {
            2
        }

        fn n_constraints(&self) -> usize {
            0
        }

        fn n_cost_terms(&self) -> usize {
            2
        }

        fn cost_terms(&self, x: &[float], terms: &mut [float]) {
            terms[0] = 10.0 * (x[1] - x[0] * x[0]);
            terms[1] = 1.0 - x[0];
        }

        fn cost_terms_jacobian(&self, x: &[float], jac: &mut sparse::Builder) {
            jac.push(0, 0, -20.0 * x[0]);
            jac.push(0, 1, 10.0);
            jac.push(1, 0, -1.0);
        }

        fn constraints(&self, _x: &[float], _g: &mut [float]) {}

        fn constraints_jacobian(&self, _x: &[float], _jac: &mut sparse::Builder) {}
    }

    /// Nearest point on the unit circle to `p`.
    struct CircleProjection {
        p: (float, float),
    }

    impl Evaluator for CircleProjection {
        fn n_vars(&self) -> usize {
            2
        }

        fn n_constraints(&self) -> usize {
            1
        }

        fn n_cost_terms(&self) -> usize {
            2
        }

        fn cost_terms(&self, x: &[float], terms: &mut [float]) {
            terms[0] = x[0] - self.p.0;
            terms[1] = x[1] - self.p.1;
        }

        fn cost_terms_jacobian(&self, _x: &[float], jac: &mut sparse::Builder) {
            jac.push(0, 0, 1.0);
            jac.push(1, 1, 1.0);
        }

        fn constraints(&self, x: &[float], g: &mut [float]) {
            g[0] = x[0] * x[0] + x[1] * x[1];
        }

        fn constraints_jacobian(&self, x: &[float], jac: &mut sparse::Builder) {
            jac.push(0, 0, 2.0 * x[0]);
            jac.push(0, 1, 2.0 * x[1]);
        }
    }

    fn settings() -> Settings {
        Settings {
            max_time: ::std::time::Duration::from_secs(10),
            max_iter: 500,
            ..Settings::default()
        }
    }

    #[test]
    fn rosenbrock_unconstrained() {
        let bounds = Bounds::uniform(2, -1e19, 1e19);
        let res = solve(&Rosenbrock, &[-1.2, 1.0], &bounds, &Bounds::uniform(0, 0.0, 0.0), &settings())
            .unwrap();

        assert!(res.status.is_success(), "{:?}", res.status);
        assert_abs_diff_eq!(res.x[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(res.x[1], 1.0, epsilon = 1e-3);
        assert!(res.obj_value < 1e-6);
    }

    #[test]
    fn rosenbrock_bounded() {
        // The unconstrained minimum is outside the box so x0 ends up on its upper bound
        let bounds = Bounds::new(vec![-2.0, -2.0], vec![0.5, 2.0]);
        let res = solve(&Rosenbrock, &[0.0, 0.0], &bounds, &Bounds::uniform(0, 0.0, 0.0), &settings())
            .unwrap();

        assert!(res.status.is_success(), "{:?}", res.status);
        assert_abs_diff_eq!(res.x[0], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(res.x[1], 0.25, epsilon = 1e-3);
    }

    #[test]
    fn equality_constrained_projection() {
        let eval = CircleProjection { p: (0.6, 0.3) };
        let res = solve(
            &eval,
            &[1.0, 0.0],
            &Bounds::uniform(2, -1e19, 1e19),
            &Bounds::uniform(1, 1.0, 1.0),
            &settings(),
        )
        .unwrap();

        let norm = float::hypot(0.6, 0.3);
        assert!(res.status.is_success(), "{:?}", res.status);
        assert!(res.constraint_violation <= 1e-4);
        assert_abs_diff_eq!(res.x[0], 0.6 / norm, epsilon = 1e-3);
        assert_abs_diff_eq!(res.x[1], 0.3 / norm, epsilon = 1e-3);
    }

    #[test]
    fn non_finite_guess_is_rejected() {
        let res = solve(
            &Rosenbrock,
            &[::std::f64::NAN, 0.0],
            &Bounds::uniform(2, -1e19, 1e19),
            &Bounds::uniform(0, 0.0, 0.0),
            &settings(),
        )
        .unwrap();
        assert_eq!(res.status, Status::NonFiniteValue);
        assert_eq!(res.iterations, 0);
        assert!(!res.status.is_success());
    }

    #[test]
    fn wrong_dimensions_are_errors() {
        let res = solve(
            &Rosenbrock,
            &[0.0],
            &Bounds::uniform(2, -1.0, 1.0),
            &Bounds::uniform(0, 0.0, 0.0),
            &settings(),
        );
        match res {
            Err(SolveError::DimensionMismatch { expected: 2, got: 1, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_time_budget_reports_time_limit() {
        let settings = Settings {
            max_time: ::std::time::Duration::from_secs(0),
            ..Settings::default()
        };
        let res = solve(
            &Rosenbrock,
            &[-1.2, 1.0],
            &Bounds::uniform(2, -1e19, 1e19),
            &Bounds::uniform(0, 0.0, 0.0),
            &settings,
        )
        .unwrap();
        assert_eq!(res.status, Status::TimeLimitReached);
        assert_eq!(res.x, vec![-1.2, 1.0]);
    }

    #[test]
    fn iteration_limit_is_not_success() {
        let settings = Settings {
            max_iter: 1,
            ..settings()
        };
        let res = solve(
            &Rosenbrock,
            &[-1.2, 1.0],
            &Bounds::uniform(2, -1e19, 1e19),
            &Bounds::uniform(0, 0.0, 0.0),
            &settings,
        )
        .unwrap();
        assert_eq!(res.status, Status::MaxIterationsReached);
        assert_eq!(res.iterations, 1);
        assert!(res.x != vec![-1.2, 1.0]);
        assert!(!res.status.is_success());
    }

    #[test]
    fn feasible_iterate_stopped_early_is_not_success() {
        let settings = Settings {
            max_iter: 1,
            ..settings()
        };
        let eval = CircleProjection { p: (0.6, 0.3) };
        let res = solve(
            &eval,
            &[1.0, 0.0],
            &Bounds::uniform(2, -1e19, 1e19),
            &Bounds::uniform(1, 1.0, 1.0),
            &settings,
        )
        .unwrap();
        assert_eq!(res.iterations, 1);
        assert!(!res.status.is_success(), "{:?}", res.status);
    }

    #[test]
    fn non_finite_qp_solution_is_rejected() {
        assert_eq!(
            step_and_multiplier(&[1.0, -2.0], &[0.5, -3.0]),
            Some((vec![1.0, -2.0], 3.0))
        );
        assert_eq!(step_and_multiplier(&[1.0, -2.0], &[::std::f64::NAN]), None);
        assert_eq!(step_and_multiplier(&[::std::f64::INFINITY], &[]), None);
    }
}
