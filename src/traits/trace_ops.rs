//! `std::ops` for [`TraceVar<F>`]: each operator records one opcode.

use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::float::Float;
use crate::function::FunctionThreadLocal;
use crate::opcode::OpCode;
use crate::trace::TraceVar;

macro_rules! impl_trace_binop {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:expr, $sym:tt) => {
        impl<F: FunctionThreadLocal> $trait for TraceVar<F> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.binary_op(rhs, $op, self.value $sym rhs.value)
            }
        }

        impl<F: FunctionThreadLocal> $assign_trait for TraceVar<F> {
            #[inline]
            fn $assign_method(&mut self, rhs: Self) {
                *self = *self $sym rhs;
            }
        }
    };
}

impl_trace_binop!(Add, add, AddAssign, add_assign, OpCode::Add, +);
impl_trace_binop!(Sub, sub, SubAssign, sub_assign, OpCode::Sub, -);
impl_trace_binop!(Mul, mul, MulAssign, mul_assign, OpCode::Mul, *);
impl_trace_binop!(Div, div, DivAssign, div_assign, OpCode::Div, /);
impl_trace_binop!(Rem, rem, RemAssign, rem_assign, OpCode::Rem, %);

impl<F: FunctionThreadLocal> Neg for TraceVar<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.unary_op(OpCode::Neg, -self.value)
    }
}

// Mixed ops: the scalar enters the graph as a `Const` node.
macro_rules! impl_trace_scalar_ops {
    ($f:ty) => {
        impl_trace_scalar_ops!(@op $f, Add, add, AddAssign, add_assign);
        impl_trace_scalar_ops!(@op $f, Sub, sub, SubAssign, sub_assign);
        impl_trace_scalar_ops!(@op $f, Mul, mul, MulAssign, mul_assign);
        impl_trace_scalar_ops!(@op $f, Div, div, DivAssign, div_assign);
        impl_trace_scalar_ops!(@op $f, Rem, rem, RemAssign, rem_assign);

        impl PartialEq<$f> for TraceVar<$f> {
            #[inline]
            fn eq(&self, other: &$f) -> bool {
                self.value == *other
            }
        }

        impl PartialOrd<$f> for TraceVar<$f> {
            #[inline]
            fn partial_cmp(&self, other: &$f) -> Option<std::cmp::Ordering> {
                self.value.partial_cmp(other)
            }
        }
    };
    (@op $f:ty, $trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident) => {
        impl $trait<$f> for TraceVar<$f> {
            type Output = TraceVar<$f>;
            #[inline]
            fn $method(self, rhs: $f) -> TraceVar<$f> {
                self.$method(TraceVar::constant(rhs))
            }
        }

        impl $trait<TraceVar<$f>> for $f {
            type Output = TraceVar<$f>;
            #[inline]
            fn $method(self, rhs: TraceVar<$f>) -> TraceVar<$f> {
                TraceVar::constant(self).$method(rhs)
            }
        }

        impl $assign_trait<$f> for TraceVar<$f> {
            #[inline]
            fn $assign_method(&mut self, rhs: $f) {
                *self = (*self).$method(TraceVar::constant(rhs));
            }
        }
    };
}

impl_trace_scalar_ops!(f32);
impl_trace_scalar_ops!(f64);

impl<F: Float> PartialEq for TraceVar<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for TraceVar<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
