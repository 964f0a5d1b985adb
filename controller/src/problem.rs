use control_model::{Actuator, KinematicBicycle, State, NI, NS};
use nlp::{Bounds, Evaluator};
use prelude::*;
use track::ReferenceCurve;

use crate::{CostWeights, MpcConfig, VariableLayout};

/// Nonlinear program for one control cycle.
///
/// Holds the fitted curve and values derived from the configuration. Nothing is carried from one
/// cycle to the next.
pub struct MpcProblem {
    layout: VariableLayout,
    model: KinematicBicycle,
    curve: ReferenceCurve,
    dt: float,
    ref_v: float,
    /// Square roots of the cost weights.
    w: CostWeights,
}

impl MpcProblem {
    pub fn new(config: &MpcConfig, curve: ReferenceCurve) -> MpcProblem {
        MpcProblem {
            layout: config.horizon.layout(),
            model: KinematicBicycle::new(config.Lf),
            curve,
            dt: config.horizon.dt,
            ref_v: config.ref_v,
            w: config.weights.sqrt(),
        }
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    /// Variable bounds: states are effectively free, actuators are held to their envelope.
    pub fn variable_bounds(&self, config: &MpcConfig) -> Bounds {
        let l = &self.layout;
        let b = &config.bounds;
        let mut bounds = Bounds::uniform(l.n_vars(), -b.state_limit, b.state_limit);
        bounds.set_range(
            l.actuator_start(VariableLayout::DELTA),
            l.intervals(),
            -b.steering_max,
            b.steering_max,
        );
        bounds.set_range(
            l.actuator_start(VariableLayout::A),
            l.intervals(),
            b.acceleration_min,
            b.acceleration_max,
        );
        bounds
    }

    /// Constraint bounds: stage 0 is pinned to `initial`, every later residual must be zero.
    pub fn constraint_bounds(&self, initial: &State) -> Bounds {
        let l = &self.layout;
        let mut bounds = Bounds::uniform(l.n_constraints(), 0.0, 0.0);
        for (field, v) in initial.to_array().iter().enumerate() {
            bounds.fix(l.state_index(field, 0), *v);
        }
        bounds
    }

    /// Rolls the model forward from `initial` with zero actuation.
    ///
    /// The result satisfies every constraint exactly so the solver starts from a feasible point.
    pub fn initial_guess(&self, initial: &State) -> Vec<float> {
        let l = &self.layout;
        let mut vars = vec![0.0; l.n_vars()];
        let u = Actuator::default();
        let mut s = *initial;
        l.set_state(&mut vars, 0, &s);
        for t in 1..l.N() {
            s = self.model.step(self.dt, &s, &u, &self.curve);
            l.set_state(&mut vars, t, &s);
        }
        vars
    }
}

impl Evaluator for MpcProblem {
    fn n_vars(&self) -> usize {
        self.layout.n_vars()
    }

    fn n_constraints(&self) -> usize {
        self.layout.n_constraints()
    }

    fn n_cost_terms(&self) -> usize {
        let N = self.layout.N();
        // cte, epsi and speed per stage, four actuator terms per interval, two rate terms per
        // pair of consecutive intervals
        3 * N + 4 * (N - 1) + 2 * (N - 2)
    }

    fn cost_terms(&self, x: &[float], terms: &mut [float]) {
        let l = &self.layout;
        let w = &self.w;
        let cte = l.states(x, VariableLayout::CTE);
        let epsi = l.states(x, VariableLayout::EPSI);
        let v = l.states(x, VariableLayout::V);
        let delta = l.actuators(x, VariableLayout::DELTA);
        let a = l.actuators(x, VariableLayout::A);

        let mut k = 0;
        let mut push = |r: float| {
            terms[k] = r;
            k += 1;
        };

        for t in 0..l.N() {
            push(w.cte * cte[t]);
            push(w.epsi * epsi[t]);
            push(w.speed * (v[t] - self.ref_v));
        }
        for t in 0..l.intervals() {
            push(w.cte_steering * cte[t] * delta[t]);
            push(w.steering * delta[t]);
            push(w.acceleration * a[t]);
            push(w.acceleration_steering * a[t] * delta[t]);
        }
        for t in 0..l.intervals() - 1 {
            push(w.steering_rate * (delta[t + 1] - delta[t]));
            push(w.acceleration_rate * (a[t + 1] - a[t]));
        }
        debug_assert_eq!(k, self.n_cost_terms());
    }

    fn cost_terms_jacobian(&self, x: &[float], jac: &mut sparse::Builder) {
        let l = &self.layout;
        let w = &self.w;
        let cte = l.states(x, VariableLayout::CTE);
        let delta = l.actuators(x, VariableLayout::DELTA);
        let a = l.actuators(x, VariableLayout::A);
        let i_cte = |t| l.state_index(VariableLayout::CTE, t);
        let i_delta = |t| l.actuator_index(VariableLayout::DELTA, t);
        let i_a = |t| l.actuator_index(VariableLayout::A, t);

        let mut k = 0;
        for t in 0..l.N() {
            jac.push(k, i_cte(t), w.cte);
            jac.push(k + 1, l.state_index(VariableLayout::EPSI, t), w.epsi);
            jac.push(k + 2, l.state_index(VariableLayout::V, t), w.speed);
            k += 3;
        }
        for t in 0..l.intervals() {
            jac.push(k, i_cte(t), w.cte_steering * delta[t]);
            jac.push(k, i_delta(t), w.cte_steering * cte[t]);
            jac.push(k + 1, i_delta(t), w.steering);
            jac.push(k + 2, i_a(t), w.acceleration);
            jac.push(k + 3, i_a(t), w.acceleration_steering * delta[t]);
            jac.push(k + 3, i_delta(t), w.acceleration_steering * a[t]);
            k += 4;
        }
        for t in 0..l.intervals() - 1 {
            jac.push(k, i_delta(t), -w.steering_rate);
            jac.push(k, i_delta(t + 1), w.steering_rate);
            jac.push(k + 1, i_a(t), -w.acceleration_rate);
            jac.push(k + 1, i_a(t + 1), w.acceleration_rate);
            k += 2;
        }
        debug_assert_eq!(k, self.n_cost_terms());
    }

    fn constraints(&self, x: &[float], g: &mut [float]) {
        let l = &self.layout;
        for field in 0..NS {
            let i = l.state_index(field, 0);
            g[i] = x[i];
        }

        for t in 1..l.N() {
            let prev = l.state(x, t - 1);
            let u = l.actuator(x, t - 1);
            let predicted = self.model.step(self.dt, &prev, &u, &self.curve).to_array();
            for (field, p) in predicted.iter().enumerate() {
                let i = l.state_index(field, t);
                g[i] = x[i] - p;
            }
        }
    }

    fn constraints_jacobian(&self, x: &[float], jac: &mut sparse::Builder) {
        let l = &self.layout;
        let (A_mask, B_mask) = self.model.linearise_sparsity();

        for field in 0..NS {
            let i = l.state_index(field, 0);
            jac.push(i, i, 1.0);
        }

        for t in 1..l.N() {
            let prev = l.state(x, t - 1);
            let u = l.actuator(x, t - 1);
            let (A, B) = self.model.linearise(self.dt, &prev, &u, &self.curve);

            for r in 0..NS {
                let row = l.state_index(r, t);
                jac.push(row, row, 1.0);
                for c in 0..NS {
                    if A_mask[(r, c)] {
                        jac.push(row, l.state_index(c, t - 1), -A[(r, c)]);
                    }
                }
                for c in 0..NI {
                    if B_mask[(r, c)] {
                        jac.push(row, l.actuator_index(c, t - 1), -B[(r, c)]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::Horizon;

    fn config(N: usize) -> MpcConfig {
        MpcConfig {
            horizon: Horizon { N, dt: 0.05 },
            ..MpcConfig::default()
        }
    }

    fn curve() -> ReferenceCurve {
        ReferenceCurve::new([0.3, 0.1, -0.02, 0.001])
    }

    fn initial() -> State {
        State {
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            v: 12.0,
            cte: 0.3,
            epsi: -0.0997,
        }
    }

    /// A point away from the rollout with every variable non-zero.
    fn perturbed(p: &MpcProblem) -> Vec<float> {
        let mut x = p.initial_guess(&initial());
        for (i, v) in x.iter_mut().enumerate() {
            *v += 0.01 * ((i % 7) as float - 3.0) + 0.005;
        }
        x
    }

    #[test]
    fn rollout_has_zero_residuals() {
        let p = MpcProblem::new(&config(10), curve());
        let x0 = p.initial_guess(&initial());
        let mut g = vec![1.0; p.n_constraints()];
        p.constraints(&x0, &mut g);

        let bounds = p.constraint_bounds(&initial());
        for (i, g) in g.iter().enumerate() {
            assert!(
                *g == bounds.lower[i] && *g == bounds.upper[i],
                "constraint {} = {} outside [{}, {}]",
                i,
                g,
                bounds.lower[i],
                bounds.upper[i]
            );
        }
        assert_eq!(bounds.max_violation(&g), 0.0);
    }

    #[test]
    fn initial_stage_is_pinned() {
        let p = MpcProblem::new(&config(5), curve());
        let bounds = p.constraint_bounds(&initial());
        let l = p.layout();
        for (field, v) in initial().to_array().iter().enumerate() {
            assert!(bounds.is_fixed(l.state_index(field, 0)));
            assert_eq!(bounds.lower[l.state_index(field, 0)], *v);
        }
        for t in 1..5 {
            assert_eq!(bounds.lower[l.state_index(VariableLayout::CTE, t)], 0.0);
            assert_eq!(bounds.upper[l.state_index(VariableLayout::CTE, t)], 0.0);
        }
    }

    #[test]
    fn variable_bounds() {
        let c = config(5);
        let p = MpcProblem::new(&c, curve());
        let b = p.variable_bounds(&c);
        let l = p.layout();
        assert_eq!(b.lower[l.state_index(VariableLayout::V, 2)], -1.0e19);
        assert_eq!(b.upper[l.state_index(VariableLayout::X, 4)], 1.0e19);
        for t in 0..4 {
            assert_eq!(b.lower[l.actuator_index(VariableLayout::DELTA, t)], -0.436332);
            assert_eq!(b.upper[l.actuator_index(VariableLayout::DELTA, t)], 0.436332);
            assert_eq!(b.lower[l.actuator_index(VariableLayout::A, t)], -1.0);
            assert_eq!(b.upper[l.actuator_index(VariableLayout::A, t)], 0.75);
        }
    }

    #[test]
    fn objective_matches_weighted_sum() {
        let c = config(4);
        let p = MpcProblem::new(&c, curve());
        let x = perturbed(&p);
        let l = p.layout();
        let w = &c.weights;
        let cte = l.states(&x, VariableLayout::CTE);
        let epsi = l.states(&x, VariableLayout::EPSI);
        let v = l.states(&x, VariableLayout::V);
        let d = l.actuators(&x, VariableLayout::DELTA);
        let a = l.actuators(&x, VariableLayout::A);

        let mut expected = 0.0;
        for t in 0..4 {
            expected += w.cte * cte[t].powi(2);
            expected += w.epsi * epsi[t].powi(2);
            expected += w.speed * (v[t] - c.ref_v).powi(2);
        }
        for t in 0..3 {
            expected += w.cte_steering * (cte[t] * d[t]).powi(2);
            expected += w.steering * d[t].powi(2);
            expected += w.acceleration * a[t].powi(2);
            expected += w.acceleration_steering * (a[t] * d[t]).powi(2);
        }
        for t in 0..2 {
            expected += w.steering_rate * (d[t + 1] - d[t]).powi(2);
            expected += w.acceleration_rate * (a[t + 1] - a[t]).powi(2);
        }

        assert_abs_diff_eq!(p.objective(&x), expected, epsilon = 1e-9 * expected);
    }

    #[test]
    fn cte_terms_increase_with_cte() {
        let p = MpcProblem::new(&config(4), curve());
        let l = *p.layout();
        let mut x = p.initial_guess(&initial());
        l.set_actuator(&mut x, 0, &Actuator { delta: 0.1, a: 0.0 });

        let mut last: Option<(float, float)> = None;
        for &cte in &[0.0, 0.5, 1.0, 2.0] {
            let i = l.state_index(VariableLayout::CTE, 0);
            x[i] = cte;
            let mut terms = vec![0.0; p.n_cost_terms()];
            p.cost_terms(&x, &mut terms);
            // cte at stage 0 is the first term, its coupling with steering the first interval term
            let cte_cost = terms[0] * terms[0];
            let coupling_cost = terms[3 * 4] * terms[3 * 4];
            if let Some((c, s)) = last {
                assert!(cte_cost > c);
                assert!(coupling_cost > s);
            }
            last = Some((cte_cost, coupling_cost));
        }
    }

    fn dense(b: &sparse::Builder) -> Vec<Vec<float>> {
        let (nr, nc) = b.shape();
        let mut m = vec![vec![0.0; nc]; nr];
        for &(r, c, v) in b.coords() {
            m[r][c] += v;
        }
        m
    }

    #[test]
    fn jacobians_match_finite_differences() {
        let p = MpcProblem::new(&config(4), curve());
        let x = perturbed(&p);
        let n = p.n_vars();
        let (nt, m) = (p.n_cost_terms(), p.n_constraints());

        let mut jr = sparse::Builder::with_capacity(nt, n, 0);
        let mut jg = sparse::Builder::with_capacity(m, n, 0);
        p.cost_terms_jacobian(&x, &mut jr);
        p.constraints_jacobian(&x, &mut jg);
        let (jr, jg) = (dense(&jr), dense(&jg));

        let h = 1e-6;
        for j in 0..n {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[j] += h;
            xm[j] -= h;

            let (mut rp, mut rm) = (vec![0.0; nt], vec![0.0; nt]);
            p.cost_terms(&xp, &mut rp);
            p.cost_terms(&xm, &mut rm);
            for i in 0..nt {
                let fd = (rp[i] - rm[i]) / (2.0 * h);
                assert_abs_diff_eq!(jr[i][j], fd, epsilon = 1e-5 * (1.0 + fd.abs()));
            }

            let (mut gp, mut gm) = (vec![0.0; m], vec![0.0; m]);
            p.constraints(&xp, &mut gp);
            p.constraints(&xm, &mut gm);
            for i in 0..m {
                let fd = (gp[i] - gm[i]) / (2.0 * h);
                assert_abs_diff_eq!(jg[i][j], fd, epsilon = 1e-5 * (1.0 + fd.abs()));
            }
        }
    }

    #[test]
    fn jacobian_pattern_is_independent_of_values() {
        let p = MpcProblem::new(&config(4), curve());
        let pattern = |x: &[float]| {
            let mut b = sparse::Builder::with_capacity(p.n_constraints(), p.n_vars(), 0);
            p.constraints_jacobian(x, &mut b);
            let mut rc: Vec<_> = b.coords().iter().map(|&(r, c, _)| (r, c)).collect();
            rc.sort();
            rc
        };
        let zeros = vec![0.0; p.n_vars()];
        assert_eq!(pattern(&zeros), pattern(&perturbed(&p)));
    }
}
