use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for the passive payload type (`f32`, `f64`).
///
/// Only primitive floats implement this; the AD wrapper types do not.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}

/// `x^(n-1)`, the power in `d/dx x^n`, for every `n` including `i32::MIN`.
#[inline]
pub(crate) fn powi_pred<T: NumFloat>(x: T, n: i32) -> T {
    match n.checked_sub(1) {
        Some(m) => x.powi(m),
        None => x.powi(n) / x,
    }
}

/// Zero test that also looks at tangent lanes.
///
/// A `Dual` adjoint with `re == 0` but `eps != 0` still carries
/// second-order information and must not be skipped by a sweep.
pub trait IsAllZero {
    fn is_all_zero(&self) -> bool;
}

impl IsAllZero for f32 {
    #[inline]
    fn is_all_zero(&self) -> bool {
        *self == 0.0
    }
}

impl IsAllZero for f64 {
    #[inline]
    fn is_all_zero(&self) -> bool {
        *self == 0.0
    }
}
