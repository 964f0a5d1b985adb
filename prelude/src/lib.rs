pub extern crate flame;
pub extern crate nalgebra;
pub extern crate rand;

use rand::Rng;

#[allow(non_camel_case_types)]
pub type float = f64;
pub use std::f64::consts::PI;
pub use std::f64::{INFINITY, NEG_INFINITY};

pub use nalgebra::{DMatrix, DVector};

/// Returns the smaller of two values. Panics if they cannot be compared (NaN).
pub fn min<T: Copy + PartialOrd>(a: T, b: T) -> T {
    match a.partial_cmp(&b).expect("NaN") {
        ::std::cmp::Ordering::Greater => b,
        _ => a,
    }
}

/// Returns the larger of two values. Panics if they cannot be compared (NaN).
pub fn max<T: Copy + PartialOrd>(a: T, b: T) -> T {
    match a.partial_cmp(&b).expect("NaN") {
        ::std::cmp::Ordering::Less => b,
        _ => a,
    }
}

pub fn clamp(v: float, lower: float, upper: float) -> float {
    max(lower, min(v, upper))
}

pub fn mph_to_mps(x: float) -> float {
    x * 0.44704
}

/// Sample from the standard normal distribution.
pub fn randn() -> float {
    rand::thread_rng().sample(rand_distr::StandardNormal)
}

/// Returns true if every value in the slice is finite.
pub fn all_finite(values: &[float]) -> bool {
    values.iter().all(|v| v.is_finite())
}
