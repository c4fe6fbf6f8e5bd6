use std::fmt::{self, Display};

use crate::error::Result;
use crate::expr::Expr;
use crate::stack::{self, StackThreadLocal, CONSTANT};
use crate::Float;

/// Active scalar: a value plus a gradient index into the current [`Stack`](crate::Stack).
///
/// `Copy` and 8 bytes larger than the payload, because the tape lives in the
/// stack, not in the value. Arithmetic records onto the thread's current
/// stack; see [`StackGuard`](crate::StackGuard).
#[derive(Clone, Copy, Debug)]
pub struct Active<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
}

impl<F: Float> Active<F> {
    /// Create a passive constant (never recorded).
    #[inline]
    pub fn constant(value: F) -> Self {
        Active {
            value,
            index: CONSTANT,
        }
    }

    /// Build from an existing gradient index.
    #[inline]
    pub fn from_parts(value: F, index: u32) -> Self {
        Active { value, index }
    }

    /// The passive value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// The gradient index ([`CONSTANT`] for passive values).
    #[inline]
    pub fn gradient_index(&self) -> u32 {
        self.index
    }

    /// Whether this value is passive.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }

    /// Lift into a lazy expression for fused recording.
    #[inline]
    pub fn expr(&self) -> Expr<F> {
        Expr::from(*self)
    }

    /// Overwrite the passive value without touching the tape.
    ///
    /// Used together with [`add_derivative_dependence`](Self::add_derivative_dependence)
    /// when the value comes from outside the AD system.
    #[inline]
    pub fn set_value(&mut self, value: F) {
        self.value = value;
    }
}

impl<F: StackThreadLocal> Active<F> {
    /// Create an active variable on the current stack.
    pub fn new(value: F) -> Self {
        let index = stack::with_active_stack(|s: &mut crate::Stack<F>| s.register_variable());
        Active { value, index }
    }

    /// Seed this value's slot in the gradient store.
    pub fn set_gradient(&self, gradient: F) {
        stack::with_active_stack(|s: &mut crate::Stack<F>| s.set_gradient(self.index, gradient));
    }

    /// Read this value's slot in the gradient store (zero if never reached).
    pub fn get_gradient(&self) -> F {
        stack::with_active_stack(|s: &mut crate::Stack<F>| s.get_gradient(self.index))
    }

    /// Declare that this value depends on `rhs[i]` with partial `multipliers[i]`.
    ///
    /// Bridges derivatives computed outside the tape: assign the externally
    /// computed value first, then call this. Records one new statement for
    /// this value's gradient index; zero multipliers are skipped.
    pub fn add_derivative_dependence(&self, rhs: &[Active<F>], multipliers: &[F]) -> Result<()> {
        self.add_derivative_dependence_strided(rhs, multipliers, 1)
    }

    /// Like [`add_derivative_dependence`](Self::add_derivative_dependence) with
    /// `multipliers[i * stride]` as the partial for `rhs[i]`.
    pub fn add_derivative_dependence_strided(
        &self,
        rhs: &[Active<F>],
        multipliers: &[F],
        stride: usize,
    ) -> Result<()> {
        let indices: Vec<u32> = rhs.iter().map(|x| x.index).collect();
        bridge::add_dependence::<F>(self.index, &indices, multipliers, stride)
    }

    /// Extend the statement opened by the immediately preceding
    /// [`add_derivative_dependence`](Self::add_derivative_dependence) on this
    /// same value.
    ///
    /// Fails with [`AdError::WrongGradient`](crate::AdError::WrongGradient) if
    /// the most recent statement belongs to a different value.
    pub fn append_derivative_dependence(&self, rhs: &[Active<F>], multipliers: &[F]) -> Result<()> {
        self.append_derivative_dependence_strided(rhs, multipliers, 1)
    }

    /// Strided form of [`append_derivative_dependence`](Self::append_derivative_dependence).
    pub fn append_derivative_dependence_strided(
        &self,
        rhs: &[Active<F>],
        multipliers: &[F],
        stride: usize,
    ) -> Result<()> {
        let indices: Vec<u32> = rhs.iter().map(|x| x.index).collect();
        bridge::append_dependence::<F>(self.index, &indices, multipliers, stride)
    }

    /// Single-input form of [`add_derivative_dependence`](Self::add_derivative_dependence).
    pub fn add_derivative_dependence_on(&self, rhs: Active<F>, multiplier: F) -> Result<()> {
        bridge::add_dependence::<F>(self.index, &[rhs.index], &[multiplier], 1)
    }

    /// Single-input form of [`append_derivative_dependence`](Self::append_derivative_dependence).
    pub fn append_derivative_dependence_on(&self, rhs: Active<F>, multiplier: F) -> Result<()> {
        bridge::append_dependence::<F>(self.index, &[rhs.index], &[multiplier], 1)
    }
}

impl<F: StackThreadLocal> Active<F> {
    /// Record `result = f(self)` with local partial `deriv`.
    #[inline]
    pub(crate) fn unary(self, value: F, deriv: F) -> Self {
        if self.index == CONSTANT {
            return Active::constant(value);
        }
        let index = stack::with_active_stack(|s: &mut crate::Stack<F>| s.push_unary(self.index, deriv));
        Active { value, index }
    }

    /// Record `result = f(self, other)` with local partials `dx`, `dy`.
    #[inline]
    pub(crate) fn binary(self, other: Self, value: F, dx: F, dy: F) -> Self {
        if self.index == CONSTANT && other.index == CONSTANT {
            return Active::constant(value);
        }
        let index = stack::with_active_stack(|s: &mut crate::Stack<F>| {
            s.push_binary(self.index, dx, other.index, dy)
        });
        Active { value, index }
    }
}

impl<F: Float> Display for Active<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Active<F> {
    fn default() -> Self {
        Active::constant(F::zero())
    }
}

/// External-derivative bridging shared by [`Active`] and array references.
pub(crate) mod bridge {
    use crate::error::{AdError, Result};
    use crate::stack::{self, StackThreadLocal, CONSTANT};

    fn check_len(n: usize, multipliers: usize, stride: usize) -> Result<()> {
        let needed = if n == 0 { 0 } else { (n - 1) * stride.max(1) + 1 };
        if multipliers < needed {
            return Err(AdError::DimensionMismatch {
                what: "derivative dependence multipliers",
                expected: needed,
                found: multipliers,
            });
        }
        Ok(())
    }

    fn check_target(lhs: u32) -> Result<()> {
        if lhs == CONSTANT {
            return Err(AdError::PassiveOutput);
        }
        Ok(())
    }

    // Validated up front so a bad index leaves no half-built statement.
    fn check_inputs<F: StackThreadLocal>(s: &crate::Stack<F>, inputs: &[u32]) -> Result<()> {
        inputs
            .iter()
            .filter(|&&idx| idx != CONSTANT)
            .try_for_each(|&idx| s.check_index(idx))
    }

    fn push_all<F: StackThreadLocal>(
        s: &mut crate::Stack<F>,
        inputs: &[u32],
        multipliers: &[F],
        stride: usize,
    ) -> Result<()> {
        for (i, &idx) in inputs.iter().enumerate() {
            let mult = multipliers[i * stride.max(1)];
            if mult != F::zero() {
                s.push_rhs(mult, idx)?;
            }
        }
        s.close_statement();
        Ok(())
    }

    pub(crate) fn add_dependence<F: StackThreadLocal>(
        lhs: u32,
        inputs: &[u32],
        multipliers: &[F],
        stride: usize,
    ) -> Result<()> {
        check_target(lhs)?;
        check_len(inputs.len(), multipliers.len(), stride)?;
        stack::with_active_stack(|s: &mut crate::Stack<F>| {
            if !s.is_recording() {
                return Ok(());
            }
            log::trace!("add_derivative_dependence: {} inputs -> index {lhs}", inputs.len());
            s.check_space(inputs.len())?;
            check_inputs(s, inputs)?;
            s.push_lhs(lhs)?;
            push_all(s, inputs, multipliers, stride)
        })
    }

    pub(crate) fn append_dependence<F: StackThreadLocal>(
        lhs: u32,
        inputs: &[u32],
        multipliers: &[F],
        stride: usize,
    ) -> Result<()> {
        check_target(lhs)?;
        check_len(inputs.len(), multipliers.len(), stride)?;
        stack::with_active_stack(|s: &mut crate::Stack<F>| {
            if !s.is_recording() {
                return Ok(());
            }
            log::trace!("append_derivative_dependence: {} inputs -> index {lhs}", inputs.len());
            s.check_space(inputs.len())?;
            check_inputs(s, inputs)?;
            s.update_lhs(lhs)?;
            push_all(s, inputs, multipliers, stride)
        })
    }
}
