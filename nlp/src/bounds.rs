use prelude::*;

/// Element-wise lower and upper bounds on a vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub lower: Vec<float>,
    pub upper: Vec<float>,
}

impl Bounds {
    pub fn new(lower: Vec<float>, upper: Vec<float>) -> Bounds {
        assert_eq!(lower.len(), upper.len());
        Bounds { lower, upper }
    }

    /// Bounds that are `lower` and `upper` everywhere.
    pub fn uniform(n: usize, lower: float, upper: float) -> Bounds {
        Bounds {
            lower: vec![lower; n],
            upper: vec![upper; n],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn set(&mut self, i: usize, lower: float, upper: float) {
        self.lower[i] = lower;
        self.upper[i] = upper;
    }

    /// Pins element `i` to exactly `value`.
    pub fn fix(&mut self, i: usize, value: float) {
        self.set(i, value, value);
    }

    pub fn set_range(&mut self, start: usize, len: usize, lower: float, upper: float) {
        for i in start..start + len {
            self.set(i, lower, upper);
        }
    }

    pub fn is_fixed(&self, i: usize) -> bool {
        self.lower[i] == self.upper[i]
    }

    /// True when no bound is NaN and every lower bound is at most its upper bound.
    pub fn is_consistent(&self) -> bool {
        self.lower
            .iter()
            .zip(&self.upper)
            .all(|(&l, &u)| !l.is_nan() && !u.is_nan() && l <= u)
    }

    /// Returns the violation of the bounds by each value.
    pub fn violations<'a>(&'a self, values: &'a [float]) -> impl Iterator<Item = float> + 'a {
        values
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&l, &u))| max(max(l - v, v - u), 0.0))
    }

    /// Sum of violations.
    pub fn l1_violation(&self, values: &[float]) -> float {
        self.violations(values).sum()
    }

    /// Largest violation.
    pub fn max_violation(&self, values: &[float]) -> float {
        self.violations(values).fold(0.0, max)
    }

    /// Clamps every value into its bounds.
    pub fn project(&self, values: &mut [float]) {
        for (v, (&l, &u)) in values.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = clamp(*v, l, u);
        }
    }
}
