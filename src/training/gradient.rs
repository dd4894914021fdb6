//! Gradient statistics for split finding.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Sum of gradients and hessians over a set of rows.
///
/// This is the sufficient statistic for every gain and weight computation:
/// histogram bins, node totals and split children all carry one. Sums are
/// kept in `f64` so that prefix accumulation over many bins stays stable.
///
/// `GradStats` is additive, so the complement of a partial sum is
/// `parent - partial`:
///
/// ```
/// use histsplit::training::GradStats;
///
/// let parent = GradStats::new(3.0, 10.0);
/// let left = GradStats::new(1.0, 4.0);
/// let right = parent - left;
/// assert_eq!(right, GradStats::new(2.0, 6.0));
/// assert_eq!(left + right, parent);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradStats {
    /// Sum of first derivatives.
    pub grad: f64,
    /// Sum of second derivatives.
    pub hess: f64,
}

impl GradStats {
    /// Neutral element for accumulation.
    pub const ZERO: Self = Self { grad: 0.0, hess: 0.0 };

    /// Create a statistic from gradient and hessian sums.
    #[inline]
    pub const fn new(grad: f64, hess: f64) -> Self {
        Self { grad, hess }
    }

    /// Gradient sum.
    #[inline]
    pub fn grad(&self) -> f64 {
        self.grad
    }

    /// Hessian sum.
    #[inline]
    pub fn hess(&self) -> f64 {
        self.hess
    }

    /// Add a single gradient pair (in-place).
    #[inline]
    pub fn add_pair(&mut self, grad: f64, hess: f64) {
        self.grad += grad;
        self.hess += hess;
    }

    /// Whether both sums are exactly zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grad == 0.0 && self.hess == 0.0
    }
}

impl Add for GradStats {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            grad: self.grad + other.grad,
            hess: self.hess + other.hess,
        }
    }
}

impl AddAssign for GradStats {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.grad += other.grad;
        self.hess += other.hess;
    }
}

impl Sub for GradStats {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }
}

impl SubAssign for GradStats {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.grad -= other.grad;
        self.hess -= other.hess;
    }
}

impl Sum for GradStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(GradStats::ZERO, |acc, s| acc + s)
    }
}

impl<'a> Sum<&'a GradStats> for GradStats {
    fn sum<I: Iterator<Item = &'a GradStats>>(iter: I) -> Self {
        iter.fold(GradStats::ZERO, |acc, s| acc + *s)
    }
}

impl From<(f64, f64)> for GradStats {
    #[inline]
    fn from((grad, hess): (f64, f64)) -> Self {
        Self { grad, hess }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_add_sub() {
        let a = GradStats::new(1.5, 2.0);
        let b = GradStats::new(-0.5, 3.0);

        assert_eq!(a + b, GradStats::new(1.0, 5.0));
        assert_eq!(a - b, GradStats::new(2.0, -1.0));

        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn test_sum() {
        let bins = [
            GradStats::new(1.0, 1.0),
            GradStats::new(2.0, 0.5),
            GradStats::new(-3.0, 0.5),
        ];
        let total: GradStats = bins.iter().sum();
        assert_eq!(total, GradStats::new(0.0, 2.0));
        assert_eq!(bins.into_iter().sum::<GradStats>(), total);
    }

    #[test]
    fn test_add_pair_and_empty() {
        let mut s = GradStats::ZERO;
        assert!(s.is_empty());
        s.add_pair(0.25, 0.75);
        assert!(!s.is_empty());
        assert_eq!(s.grad(), 0.25);
        assert_eq!(s.hess(), 0.75);
    }

    proptest! {
        #[test]
        fn add_then_subtract_recovers(
            ag in -1e6f64..1e6, ah in 0.0f64..1e6,
            bg in -1e6f64..1e6, bh in 0.0f64..1e6,
        ) {
            let a = GradStats::new(ag, ah);
            let b = GradStats::new(bg, bh);
            let back = (a + b) - b;
            assert_abs_diff_eq!(back.grad, a.grad, epsilon = 1e-6);
            assert_abs_diff_eq!(back.hess, a.hess, epsilon = 1e-6);
        }
    }
}
