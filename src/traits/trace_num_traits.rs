//! `num_traits` for [`TraceVar<F>`]. Every function records its opcode, so
//! piecewise-constant ones (`floor`, `signum`, ...) are re-evaluated on
//! replay even though their derivative is zero.

use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::function::FunctionThreadLocal;
use crate::opcode::OpCode;
use crate::trace::TraceVar;
use crate::traits::num_traits_impls::{impl_scalar_boilerplate, lit};

impl_scalar_boilerplate!(TraceVar, value, [FunctionThreadLocal]);

impl<F: FunctionThreadLocal> NumFloat for TraceVar<F> {
    fn nan() -> Self { TraceVar::constant(F::nan()) }
    fn infinity() -> Self { TraceVar::constant(F::infinity()) }
    fn neg_infinity() -> Self { TraceVar::constant(F::neg_infinity()) }
    fn neg_zero() -> Self { TraceVar::constant(F::neg_zero()) }

    fn min_value() -> Self { TraceVar::constant(F::min_value()) }
    fn min_positive_value() -> Self { TraceVar::constant(F::min_positive_value()) }
    fn max_value() -> Self { TraceVar::constant(F::max_value()) }
    fn epsilon() -> Self { TraceVar::constant(F::epsilon()) }

    fn is_nan(self) -> bool { self.value.is_nan() }
    fn is_infinite(self) -> bool { self.value.is_infinite() }
    fn is_finite(self) -> bool { self.value.is_finite() }
    fn is_normal(self) -> bool { self.value.is_normal() }
    fn is_sign_positive(self) -> bool { self.value.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.value.is_sign_negative() }
    fn classify(self) -> FpCategory { self.value.classify() }

    fn floor(self) -> Self { self.unary_op(OpCode::Floor, self.value.floor()) }
    fn ceil(self) -> Self { self.unary_op(OpCode::Ceil, self.value.ceil()) }
    fn round(self) -> Self { self.unary_op(OpCode::Round, self.value.round()) }
    fn trunc(self) -> Self { self.unary_op(OpCode::Trunc, self.value.trunc()) }
    fn fract(self) -> Self { self.unary_op(OpCode::Fract, self.value.fract()) }
    fn abs(self) -> Self { self.unary_op(OpCode::Abs, self.value.abs()) }
    fn signum(self) -> Self { self.unary_op(OpCode::Signum, self.value.signum()) }

    fn mul_add(self, a: Self, b: Self) -> Self { self * a + b }
    fn recip(self) -> Self { self.unary_op(OpCode::Recip, self.value.recip()) }
    fn powi(self, n: i32) -> Self { self.powi_op(n, self.value.powi(n)) }
    fn powf(self, n: Self) -> Self { self.binary_op(n, OpCode::Powf, self.value.powf(n.value)) }
    fn sqrt(self) -> Self { self.unary_op(OpCode::Sqrt, self.value.sqrt()) }
    fn cbrt(self) -> Self { self.unary_op(OpCode::Cbrt, self.value.cbrt()) }

    fn exp(self) -> Self { self.unary_op(OpCode::Exp, self.value.exp()) }
    fn exp2(self) -> Self { self.unary_op(OpCode::Exp2, self.value.exp2()) }
    fn exp_m1(self) -> Self { self.unary_op(OpCode::ExpM1, self.value.exp_m1()) }
    fn ln(self) -> Self { self.unary_op(OpCode::Ln, self.value.ln()) }
    fn log2(self) -> Self { self.unary_op(OpCode::Log2, self.value.log2()) }
    fn log10(self) -> Self { self.unary_op(OpCode::Log10, self.value.log10()) }
    fn ln_1p(self) -> Self { self.unary_op(OpCode::Ln1p, self.value.ln_1p()) }
    fn log(self, base: Self) -> Self { self.ln() / base.ln() }

    fn sin(self) -> Self { self.unary_op(OpCode::Sin, self.value.sin()) }
    fn cos(self) -> Self { self.unary_op(OpCode::Cos, self.value.cos()) }
    fn tan(self) -> Self { self.unary_op(OpCode::Tan, self.value.tan()) }
    fn sin_cos(self) -> (Self, Self) { (self.sin(), self.cos()) }
    fn asin(self) -> Self { self.unary_op(OpCode::Asin, self.value.asin()) }
    fn acos(self) -> Self { self.unary_op(OpCode::Acos, self.value.acos()) }
    fn atan(self) -> Self { self.unary_op(OpCode::Atan, self.value.atan()) }
    fn atan2(self, other: Self) -> Self {
        self.binary_op(other, OpCode::Atan2, self.value.atan2(other.value))
    }

    fn sinh(self) -> Self { self.unary_op(OpCode::Sinh, self.value.sinh()) }
    fn cosh(self) -> Self { self.unary_op(OpCode::Cosh, self.value.cosh()) }
    fn tanh(self) -> Self { self.unary_op(OpCode::Tanh, self.value.tanh()) }
    fn asinh(self) -> Self { self.unary_op(OpCode::Asinh, self.value.asinh()) }
    fn acosh(self) -> Self { self.unary_op(OpCode::Acosh, self.value.acosh()) }
    fn atanh(self) -> Self { self.unary_op(OpCode::Atanh, self.value.atanh()) }

    fn hypot(self, other: Self) -> Self {
        self.binary_op(other, OpCode::Hypot, self.value.hypot(other.value))
    }
    fn max(self, other: Self) -> Self {
        self.binary_op(other, OpCode::Max, self.value.max(other.value))
    }
    fn min(self, other: Self) -> Self {
        self.binary_op(other, OpCode::Min, self.value.min(other.value))
    }
    fn abs_sub(self, other: Self) -> Self {
        (self - other).max(Self::zero())
    }

    fn integer_decode(self) -> (u64, i16, i8) { self.value.integer_decode() }

    fn to_degrees(self) -> Self { self * TraceVar::constant(lit::<F>(180.0) / F::PI()) }
    fn to_radians(self) -> Self { self * TraceVar::constant(F::PI() / lit::<F>(180.0)) }
}
