use std::fmt::{self, Display};

use crate::float::IsAllZero;
use crate::Float;

/// Forward-mode dual number: a value paired with its tangent.
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`. Besides direct
/// forward-mode use it carries the tangent direction in the
/// forward-over-reverse Hessian sweeps of the recorded-graph mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dual<F: Float> {
    /// Primal (real) value.
    pub re: F,
    /// Tangent (derivative) value.
    pub eps: F,
}

impl<F: Float> Display for Dual<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<F: Float> Dual<F> {
    #[inline]
    pub fn new(re: F, eps: F) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero tangent).
    #[inline]
    pub fn constant(re: F) -> Self {
        Dual { re, eps: F::zero() }
    }

    /// Create a variable (unit tangent) for differentiation.
    #[inline]
    pub fn variable(re: F) -> Self {
        Dual { re, eps: F::one() }
    }

    /// Chain rule: given `f(self.re)` and `f'(self.re)`, produce the dual result.
    #[inline]
    pub(crate) fn chain(self, f_val: F, f_deriv: F) -> Self {
        Dual {
            re: f_val,
            eps: self.eps * f_deriv,
        }
    }
}

impl<F: Float> IsAllZero for Dual<F> {
    #[inline]
    fn is_all_zero(&self) -> bool {
        self.re == F::zero() && self.eps == F::zero()
    }
}
