use serde::{Deserialize, Serialize};

use control_model::{Actuator, State, NI, NS};
use prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Horizon {
    /// Number of state stages, including the measured one.
    pub N: usize,
    /// Time between stages in seconds.
    pub dt: float,
}

impl Default for Horizon {
    fn default() -> Horizon {
        Horizon { N: 25, dt: 0.05 }
    }
}

impl Horizon {
    pub fn layout(&self) -> VariableLayout {
        VariableLayout::new(self.N)
    }
}

/// Offsets into the flat variable vector.
///
/// The vector holds `N` samples of each state field in the order of `State`, followed by `N - 1`
/// steering angles and `N - 1` accelerations. Constraints use the same layout as the state part:
/// row `field * N + t` is the constraint on stage `t` of `field`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableLayout {
    N: usize,
}

impl VariableLayout {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const PSI: usize = 2;
    pub const V: usize = 3;
    pub const CTE: usize = 4;
    pub const EPSI: usize = 5;

    pub const DELTA: usize = 0;
    pub const A: usize = 1;

    pub fn new(N: usize) -> VariableLayout {
        assert!(N >= 2, "horizon needs at least two stages");
        VariableLayout { N }
    }

    pub fn N(&self) -> usize {
        self.N
    }

    /// Number of actuator intervals.
    pub fn intervals(&self) -> usize {
        self.N - 1
    }

    pub fn n_vars(&self) -> usize {
        NS * self.N + NI * self.intervals()
    }

    pub fn n_constraints(&self) -> usize {
        NS * self.N
    }

    pub fn state_start(&self, field: usize) -> usize {
        debug_assert!(field < NS);
        field * self.N
    }

    pub fn actuator_start(&self, field: usize) -> usize {
        debug_assert!(field < NI);
        NS * self.N + field * self.intervals()
    }

    pub fn state_index(&self, field: usize, t: usize) -> usize {
        debug_assert!(t < self.N);
        self.state_start(field) + t
    }

    pub fn actuator_index(&self, field: usize, t: usize) -> usize {
        debug_assert!(t < self.intervals());
        self.actuator_start(field) + t
    }

    pub fn state(&self, vars: &[float], t: usize) -> State {
        let mut a = [0.0; NS];
        for (field, a) in a.iter_mut().enumerate() {
            *a = vars[self.state_index(field, t)];
        }
        State::from_array(a)
    }

    pub fn set_state(&self, vars: &mut [float], t: usize, s: &State) {
        for (field, v) in s.to_array().iter().enumerate() {
            vars[self.state_index(field, t)] = *v;
        }
    }

    pub fn actuator(&self, vars: &[float], t: usize) -> Actuator {
        Actuator {
            delta: vars[self.actuator_index(Self::DELTA, t)],
            a: vars[self.actuator_index(Self::A, t)],
        }
    }

    pub fn set_actuator(&self, vars: &mut [float], t: usize, u: &Actuator) {
        vars[self.actuator_index(Self::DELTA, t)] = u.delta;
        vars[self.actuator_index(Self::A, t)] = u.a;
    }

    pub fn actuators<'a>(&self, vars: &'a [float], field: usize) -> &'a [float] {
        let start = self.actuator_start(field);
        &vars[start..start + self.intervals()]
    }

    pub fn states<'a>(&self, vars: &'a [float], field: usize) -> &'a [float] {
        let start = self.state_start(field);
        &vars[start..start + self.N]
    }
}
