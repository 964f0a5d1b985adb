use prelude::*;

use crate::{Point, ReferenceCurve};

pub const DEGREE: usize = 3;
pub const MIN_POINTS: usize = DEGREE + 1;

/// Columns of the design matrix whose QR diagonal falls below this fraction of the column norm
/// are treated as linearly dependent.
const RANK_TOLERANCE: float = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("a cubic fit needs at least {required} points, got {got}")]
    TooFewPoints { got: usize, required: usize },

    #[error("reference points do not determine a unique cubic (repeated or too few distinct x values)")]
    Singular,

    #[error("reference points contain non-finite values")]
    NonFinite,
}

/// Least squares fit of a cubic to vehicle frame points using a Householder QR factorisation of
/// the Vandermonde matrix.
pub fn fit(points: &[Point]) -> Result<ReferenceCurve, FitError> {
    let _guard = flame::start_guard("reference fit");

    let m = points.len();
    if m < MIN_POINTS {
        return Err(FitError::TooFewPoints {
            got: m,
            required: MIN_POINTS,
        });
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let mut A = DMatrix::<float>::zeros(m, DEGREE + 1);
    for (j, p) in points.iter().enumerate() {
        A[(j, 0)] = 1.0;
        for i in 0..DEGREE {
            A[(j, i + 1)] = A[(j, i)] * p.x;
        }
    }
    let y = DVector::from_iterator(m, points.iter().map(|p| p.y));

    let col_norms: Vec<_> = (0..=DEGREE).map(|c| A.column(c).norm()).collect();
    let qr = A.qr();
    let R = qr.r();
    for (c, &norm) in col_norms.iter().enumerate() {
        if !(R[(c, c)].abs() > RANK_TOLERANCE * norm) {
            debug!("rank deficient fit: |R[{0},{0}]| = {1:e}", c, R[(c, c)].abs());
            return Err(FitError::Singular);
        }
    }

    let qty = qr.q().transpose() * y;
    let coeffs = R.solve_upper_triangular(&qty).ok_or(FitError::Singular)?;
    if !all_finite(coeffs.as_slice()) {
        return Err(FitError::Singular);
    }

    Ok(ReferenceCurve::new([coeffs[0], coeffs[1], coeffs[2], coeffs[3]]))
}
