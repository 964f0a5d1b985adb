#![allow(non_snake_case)]

//! Adapts `sparse` matrices to the `osqp` crate and wraps setup and solve in profiling spans.

use osqp::Problem as InnerProblem;
pub use osqp::{Settings, SetupError, Solution, Status};

use prelude::*;

pub struct Problem {
    inner: InnerProblem,
}

impl Problem {
    /// Sets up `min 0.5 x'Px + q'x  s.t.  l <= Ax <= u`.
    ///
    /// `P` must only contain entries on or above its diagonal.
    pub fn new(
        P: &sparse::CscMatrix,
        q: &[float],
        A: &sparse::CscMatrix,
        l: &[float],
        u: &[float],
        settings: &Settings,
    ) -> Result<Problem, SetupError> {
        debug_assert!(P.is_upper_tri(), "P must be upper triangular");
        let _guard = flame::start_guard("osqp setup");
        let inner = InnerProblem::new(convert_sparse(P), q, convert_sparse(A), l, u, settings)?;
        Ok(Problem { inner })
    }

    pub fn solve(&mut self) -> Status<'_> {
        let _guard = flame::start_guard("osqp solve");
        self.inner.solve()
    }
}

pub fn convert_sparse(this: &sparse::CscMatrix) -> osqp::CscMatrix<'_> {
    let (nrows, ncols) = this.shape();
    osqp::CscMatrix {
        nrows,
        ncols,
        indptr: this.indptr().into(),
        indices: this.indices().into(),
        data: this.data().into(),
    }
}
