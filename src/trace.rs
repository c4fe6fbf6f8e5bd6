//! Scalar that records opcodes into an [`ActiveFunction`](crate::ActiveFunction).
//!
//! [`TraceVar<F>`] mirrors [`Active<F>`](crate::Active) but records into the
//! thread's current function graph instead of the stack, so the recording
//! can be replayed at new inputs.

use std::fmt::{self, Display};

use crate::float::Float;
use crate::function::{self, ActiveFunction, FunctionThreadLocal};
use crate::opcode::{OpCode, UNUSED};
use crate::stack::CONSTANT;

/// Graph-recording scalar: a value plus a node index.
#[derive(Clone, Copy, Debug)]
pub struct TraceVar<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
}

impl<F: Float> TraceVar<F> {
    /// Passive constant; enters the graph only when combined with a variable.
    #[inline]
    pub fn constant(value: F) -> Self {
        TraceVar {
            value,
            index: CONSTANT,
        }
    }

    #[inline]
    pub fn from_parts(value: F, index: u32) -> Self {
        TraceVar { value, index }
    }

    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Node index, or [`CONSTANT`] for passive values.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }

    #[inline]
    fn node(&self, func: &mut ActiveFunction<F>) -> u32 {
        if self.index == CONSTANT {
            func.push_const(self.value)
        } else {
            self.index
        }
    }
}

impl<F: FunctionThreadLocal> TraceVar<F> {
    #[inline]
    pub(crate) fn unary_op(self, op: OpCode, value: F) -> Self {
        if self.index == CONSTANT {
            return TraceVar::constant(value);
        }
        let index = function::with_active_function(|t| t.push_op(op, self.index, UNUSED, value));
        TraceVar { value, index }
    }

    #[inline]
    pub(crate) fn binary_op(self, rhs: Self, op: OpCode, value: F) -> Self {
        if self.index == CONSTANT && rhs.index == CONSTANT {
            return TraceVar::constant(value);
        }
        let index = function::with_active_function(|t| {
            let a = self.node(t);
            let b = rhs.node(t);
            t.push_op(op, a, b, value)
        });
        TraceVar { value, index }
    }

    #[inline]
    pub(crate) fn powi_op(self, n: i32, value: F) -> Self {
        if self.index == CONSTANT {
            return TraceVar::constant(value);
        }
        let index = function::with_active_function(|t| t.push_powi(self.index, n, value));
        TraceVar { value, index }
    }
}

impl<F: Float> Display for TraceVar<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for TraceVar<F> {
    fn default() -> Self {
        TraceVar::constant(F::zero())
    }
}
