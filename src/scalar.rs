//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work unchanged with
//! plain `f64`, [`Dual<f64>`](crate::Dual), [`Active<f64>`](crate::Active)
//! and, with the `graph` feature, [`TraceVar<f64>`](crate::TraceVar).

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::active::Active;
use crate::dual::Dual;
use crate::float::Float;
use crate::stack::StackThreadLocal;

/// Numeric type usable in differentiable code.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar as a constant.
    fn from_f(val: Self::Float) -> Self;

    /// The primal value.
    fn value(&self) -> Self::Float;
}

macro_rules! impl_scalar_primitive {
    ($f:ty) => {
        impl Scalar for $f {
            type Float = $f;

            #[inline]
            fn from_f(val: $f) -> Self {
                val
            }

            #[inline]
            fn value(&self) -> $f {
                *self
            }
        }
    };
}

impl_scalar_primitive!(f32);
impl_scalar_primitive!(f64);

impl<F: Float> Scalar for Dual<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Dual::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.re
    }
}

impl<F: StackThreadLocal> Scalar for Active<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Active::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }
}

#[cfg(feature = "graph")]
impl<F: crate::function::FunctionThreadLocal> Scalar for crate::trace::TraceVar<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        crate::trace::TraceVar::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }
}
