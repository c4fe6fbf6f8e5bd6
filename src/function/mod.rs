//! Recorded graph for repeated derivative evaluation.
//!
//! Unlike the [`Stack`](crate::Stack), which stores multipliers evaluated at
//! record time, an [`ActiveFunction`] stores opcodes. It can therefore be
//! replayed at new inputs without re-recording: [`forward`](ActiveFunction::forward)
//! recomputes values, and every derivative method recomputes the local
//! partials from those values.
//!
//! # Limitations
//!
//! The graph records one execution path. If the recorded function branches
//! on values (`if x > 0 { ... } else { ... }`), replaying at inputs that
//! take a different branch gives results for the recorded branch.

use num_traits::Float as NumFloat;

use crate::error::{AdError, Result};
use crate::float::Float;
use crate::opcode::{self, OpCode, UNUSED};

// Each submodule adds impl blocks to ActiveFunction<F>.
mod forward;
mod jacobian;
mod optimize;
mod reverse;
mod tangent;

#[cfg(feature = "parallel")]
mod parallel;
#[cfg(feature = "serde")]
mod serde_support;

mod thread_local;
pub use self::thread_local::{with_active_function, FunctionGuard, FunctionThreadLocal};

/// A recorded function `R^n → R^m` that can be re-evaluated and
/// differentiated at any input point.
///
/// Created with [`record`](crate::record) or [`record_multi`](crate::record_multi).
/// Node `i` of the graph is the `i`-th recorded entry; the first
/// [`num_inputs`](Self::num_inputs) nodes are the independent variables.
#[derive(Clone, Debug)]
pub struct ActiveFunction<F: Float> {
    pub(crate) opcodes: Vec<OpCode>,
    pub(crate) arg_indices: Vec<[u32; 2]>,
    pub(crate) values: Vec<F>,
    pub(crate) num_inputs: u32,
    pub(crate) num_variables: u32,
    pub(crate) output_indices: Vec<u32>,
}

impl<F: Float> Default for ActiveFunction<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> ActiveFunction<F> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty graph with room for `est_ops` nodes.
    pub fn with_capacity(est_ops: usize) -> Self {
        ActiveFunction {
            opcodes: Vec::with_capacity(est_ops),
            arg_indices: Vec::with_capacity(est_ops),
            values: Vec::with_capacity(est_ops),
            num_inputs: 0,
            num_variables: 0,
            output_indices: Vec::new(),
        }
    }

    #[inline]
    fn push_node(&mut self, op: OpCode, args: [u32; 2], value: F) -> u32 {
        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(op);
        self.arg_indices.push(args);
        self.values.push(value);
        idx
    }

    /// Register an independent variable. Returns its node index.
    ///
    /// # Panics
    ///
    /// Panics if any non-input node was recorded before: inputs occupy the
    /// leading node indices.
    pub fn new_input(&mut self, value: F) -> u32 {
        assert!(
            self.num_inputs == self.num_variables,
            "inputs must be registered before any other node"
        );
        self.num_inputs += 1;
        self.push_node(OpCode::Input, [UNUSED, UNUSED], value)
    }

    /// Register a scalar constant. Returns its node index.
    #[inline]
    pub fn push_const(&mut self, value: F) -> u32 {
        self.push_node(OpCode::Const, [UNUSED, UNUSED], value)
    }

    /// Record an operation. Returns the result's node index.
    ///
    /// If every operand is a `Const`, a single `Const` holding `value` is
    /// recorded instead. Identity patterns (`x + 0`, `x * 1`, `x / 1`,
    /// `x - 0`) return the existing operand, and absorbing patterns
    /// (`x * 0`, `x - x`, `x / x`) fold to a constant when the computed
    /// value agrees, so NaN and infinity propagate unchanged.
    pub fn push_op(&mut self, op: OpCode, arg0: u32, arg1: u32, value: F) -> u32 {
        let arg0_const = self.opcodes[arg0 as usize] == OpCode::Const;
        let arg1_const = arg1 == UNUSED || self.opcodes[arg1 as usize] == OpCode::Const;
        if arg0_const && arg1_const {
            return self.push_const(value);
        }

        if (arg0_const || arg1_const) && arg1 != UNUSED {
            if let Some(idx) = self.try_algebraic_simplify(op, arg0, arg1, arg0_const, arg1_const, value)
            {
                return idx;
            }
        }

        if arg0 == arg1 && arg1 != UNUSED {
            match op {
                OpCode::Sub if value == F::zero() => return self.push_const(value),
                OpCode::Div if value == F::one() => return self.push_const(value),
                _ => {}
            }
        }

        self.push_node(op, [arg0, arg1], value)
    }

    #[inline(never)]
    fn try_algebraic_simplify(
        &mut self,
        op: OpCode,
        arg0: u32,
        arg1: u32,
        arg0_const: bool,
        arg1_const: bool,
        value: F,
    ) -> Option<u32> {
        let zero = F::zero();
        let one = F::one();
        let c0 = self.values[arg0 as usize];
        let c1 = self.values[arg1 as usize];
        match op {
            OpCode::Add if arg1_const && c1 == zero => Some(arg0),
            OpCode::Add if arg0_const && c0 == zero => Some(arg1),
            OpCode::Sub if arg1_const && c1 == zero => Some(arg0),
            OpCode::Mul if arg1_const && c1 == one => Some(arg0),
            OpCode::Mul if arg0_const && c0 == one => Some(arg1),
            OpCode::Mul
                if ((arg1_const && c1 == zero) || (arg0_const && c0 == zero)) && value == zero =>
            {
                Some(self.push_const(value))
            }
            OpCode::Div if arg1_const && c1 == one => Some(arg0),
            _ => None,
        }
    }

    /// Record an integer power.
    ///
    /// Folds constants, `x^1 → x` and `x^0 → 1` (when the value is 1), and
    /// records `x^-1` as a reciprocal.
    pub fn push_powi(&mut self, arg0: u32, exp: i32, value: F) -> u32 {
        if self.opcodes[arg0 as usize] == OpCode::Const {
            return self.push_const(value);
        }
        if exp == 0 && value == F::one() {
            return self.push_const(value);
        }
        if exp == 1 {
            return arg0;
        }
        if exp == -1 {
            return self.push_op(OpCode::Recip, arg0, UNUSED, value);
        }
        self.push_node(OpCode::Powi, [arg0, opcode::powi_exp_encode(exp)], value)
    }

    /// Mark the dependent variables, in output order.
    pub fn set_outputs(&mut self, indices: &[u32]) {
        self.output_indices = indices.to_vec();
    }

    /// Node indices of the dependent variables.
    pub fn output_indices(&self) -> &[u32] {
        &self.output_indices
    }

    /// Number of independent variables.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs as usize
    }

    /// Number of dependent variables.
    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }

    /// Number of nodes, inputs and constants included.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.opcodes.len()
    }

    /// Opcode of every node.
    pub fn opcodes(&self) -> &[OpCode] {
        &self.opcodes
    }

    /// Output values at the most recent evaluation point.
    pub fn output_values(&self) -> Vec<F> {
        self.output_indices
            .iter()
            .map(|&idx| self.values[idx as usize])
            .collect()
    }

    /// First output value at the most recent evaluation point.
    ///
    /// # Panics
    ///
    /// Panics if no outputs were marked.
    pub fn output_value(&self) -> F {
        assert!(!self.output_indices.is_empty(), "function has no outputs");
        self.values[self.output_indices[0] as usize]
    }

    pub(crate) fn check_len(&self, what: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected != found {
            return Err(AdError::DimensionMismatch {
                what,
                expected,
                found,
            });
        }
        Ok(())
    }

    pub(crate) fn require_outputs(&self) -> Result<()> {
        if self.output_indices.is_empty() {
            return Err(AdError::DimensionMismatch {
                what: "function outputs",
                expected: 1,
                found: 0,
            });
        }
        Ok(())
    }

    pub(crate) fn check_inputs(&self, x: &[F]) -> Result<()> {
        self.check_len("function inputs", self.num_inputs(), x.len())
    }

    /// Operand values of node `i`, read from `vals`.
    ///
    /// For `Powi` the second operand is the exponent itself.
    #[inline]
    pub(crate) fn operands<T: NumFloat>(&self, i: usize, vals: &[T]) -> (T, T) {
        let op = self.opcodes[i];
        let [a_idx, b_idx] = self.arg_indices[i];
        let a = vals[a_idx as usize];
        let b = if op == OpCode::Powi {
            T::from(opcode::powi_exp_decode(b_idx)).unwrap_or_else(T::zero)
        } else if b_idx != UNUSED {
            vals[b_idx as usize]
        } else {
            T::zero()
        };
        (a, b)
    }
}
