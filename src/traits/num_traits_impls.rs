use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::active::Active;
use crate::dual::Dual;
use crate::float::{powi_pred, Float};
use crate::stack::StackThreadLocal;

/// Small literal in the underlying float type.
#[inline]
pub(crate) fn lit<F: Float>(x: f64) -> F {
    F::from_f64(x).unwrap_or_else(F::nan)
}

// Shared constant/conversion boilerplate for wrapper scalars.
macro_rules! impl_scalar_boilerplate {
    ($t:ident, $field:ident, [$($bound:tt)*]) => {
        impl<F: $($bound)*> Zero for $t<F> {
            #[inline]
            fn zero() -> Self {
                $t::constant(F::zero())
            }
            #[inline]
            fn is_zero(&self) -> bool {
                self.$field.is_zero()
            }
        }

        impl<F: $($bound)*> One for $t<F> {
            #[inline]
            fn one() -> Self {
                $t::constant(F::one())
            }
        }

        impl<F: $($bound)*> Num for $t<F> {
            type FromStrRadixErr = F::FromStrRadixErr;
            fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
                F::from_str_radix(str, radix).map($t::constant)
            }
        }

        impl<F: $($bound)*> FromPrimitive for $t<F> {
            #[inline]
            fn from_i64(n: i64) -> Option<Self> {
                F::from_i64(n).map($t::constant)
            }
            #[inline]
            fn from_u64(n: u64) -> Option<Self> {
                F::from_u64(n).map($t::constant)
            }
            #[inline]
            fn from_f32(n: f32) -> Option<Self> {
                F::from_f32(n).map($t::constant)
            }
            #[inline]
            fn from_f64(n: f64) -> Option<Self> {
                F::from_f64(n).map($t::constant)
            }
        }

        impl<F: $($bound)*> ToPrimitive for $t<F> {
            #[inline]
            fn to_i64(&self) -> Option<i64> {
                self.$field.to_i64()
            }
            #[inline]
            fn to_u64(&self) -> Option<u64> {
                self.$field.to_u64()
            }
            #[inline]
            fn to_f32(&self) -> Option<f32> {
                self.$field.to_f32()
            }
            #[inline]
            fn to_f64(&self) -> Option<f64> {
                self.$field.to_f64()
            }
        }

        impl<F: $($bound)*> NumCast for $t<F> {
            #[inline]
            fn from<T: ToPrimitive>(n: T) -> Option<Self> {
                <F as NumCast>::from(n).map($t::constant)
            }
        }

        impl<F: $($bound)*> Signed for $t<F> {
            #[inline]
            fn abs(&self) -> Self {
                NumFloat::abs(*self)
            }
            #[inline]
            fn abs_sub(&self, other: &Self) -> Self {
                if self.$field > other.$field {
                    *self - *other
                } else {
                    Self::zero()
                }
            }
            #[inline]
            fn signum(&self) -> Self {
                NumFloat::signum(*self)
            }
            #[inline]
            fn is_positive(&self) -> bool {
                self.$field.is_sign_positive()
            }
            #[inline]
            fn is_negative(&self) -> bool {
                self.$field.is_sign_negative()
            }
        }

        #[allow(non_snake_case)]
        impl<F: $($bound)*> FloatConst for $t<F> {
            fn E() -> Self { $t::constant(F::E()) }
            fn FRAC_1_PI() -> Self { $t::constant(F::FRAC_1_PI()) }
            fn FRAC_1_SQRT_2() -> Self { $t::constant(F::FRAC_1_SQRT_2()) }
            fn FRAC_2_PI() -> Self { $t::constant(F::FRAC_2_PI()) }
            fn FRAC_2_SQRT_PI() -> Self { $t::constant(F::FRAC_2_SQRT_PI()) }
            fn FRAC_PI_2() -> Self { $t::constant(F::FRAC_PI_2()) }
            fn FRAC_PI_3() -> Self { $t::constant(F::FRAC_PI_3()) }
            fn FRAC_PI_4() -> Self { $t::constant(F::FRAC_PI_4()) }
            fn FRAC_PI_6() -> Self { $t::constant(F::FRAC_PI_6()) }
            fn FRAC_PI_8() -> Self { $t::constant(F::FRAC_PI_8()) }
            fn LN_10() -> Self { $t::constant(F::LN_10()) }
            fn LN_2() -> Self { $t::constant(F::LN_2()) }
            fn LOG10_E() -> Self { $t::constant(F::LOG10_E()) }
            fn LOG2_E() -> Self { $t::constant(F::LOG2_E()) }
            fn PI() -> Self { $t::constant(F::PI()) }
            fn SQRT_2() -> Self { $t::constant(F::SQRT_2()) }
            fn TAU() -> Self { $t::constant(F::TAU()) }
            fn LOG10_2() -> Self { $t::constant(F::LOG10_2()) }
            fn LOG2_10() -> Self { $t::constant(F::LOG2_10()) }
        }
    };
}

pub(crate) use impl_scalar_boilerplate;

impl_scalar_boilerplate!(Dual, re, [Float]);
impl_scalar_boilerplate!(Active, value, [StackThreadLocal]);

// ══════════════════════════════════════════════
//  Dual<F>
// ══════════════════════════════════════════════

impl<F: Float> NumFloat for Dual<F> {
    fn nan() -> Self { Dual::constant(F::nan()) }
    fn infinity() -> Self { Dual::constant(F::infinity()) }
    fn neg_infinity() -> Self { Dual::constant(F::neg_infinity()) }
    fn neg_zero() -> Self { Dual::constant(F::neg_zero()) }

    fn min_value() -> Self { Dual::constant(F::min_value()) }
    fn min_positive_value() -> Self { Dual::constant(F::min_positive_value()) }
    fn max_value() -> Self { Dual::constant(F::max_value()) }
    fn epsilon() -> Self { Dual::constant(F::epsilon()) }

    fn is_nan(self) -> bool { self.re.is_nan() }
    fn is_infinite(self) -> bool { self.re.is_infinite() }
    fn is_finite(self) -> bool { self.re.is_finite() }
    fn is_normal(self) -> bool { self.re.is_normal() }
    fn is_sign_positive(self) -> bool { self.re.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.re.is_sign_negative() }
    fn classify(self) -> FpCategory { self.re.classify() }

    fn floor(self) -> Self { Dual::constant(self.re.floor()) }
    fn ceil(self) -> Self { Dual::constant(self.re.ceil()) }
    fn round(self) -> Self { Dual::constant(self.re.round()) }
    fn trunc(self) -> Self { Dual::constant(self.re.trunc()) }
    fn fract(self) -> Self { self.chain(self.re.fract(), F::one()) }
    fn abs(self) -> Self { self.chain(self.re.abs(), self.re.signum()) }
    fn signum(self) -> Self { Dual::constant(self.re.signum()) }

    fn mul_add(self, a: Self, b: Self) -> Self { self * a + b }

    fn recip(self) -> Self {
        let inv = F::one() / self.re;
        self.chain(inv, -inv * inv)
    }

    fn powi(self, n: i32) -> Self {
        let deriv = if n == 0 {
            F::zero()
        } else {
            lit::<F>(n as f64) * powi_pred(self.re, n)
        };
        self.chain(self.re.powi(n), deriv)
    }

    fn powf(self, n: Self) -> Self {
        let val = self.re.powf(n.re);
        let dx = n.re * self.re.powf(n.re - F::one());
        // The exponent term vanishes for constant exponents; skip it so
        // that negative bases stay finite.
        let dy = if n.eps == F::zero() { F::zero() } else { val * self.re.ln() };
        Dual { re: val, eps: self.eps * dx + n.eps * dy }
    }

    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, F::one() / (lit::<F>(2.0) * s))
    }

    fn cbrt(self) -> Self {
        let c = self.re.cbrt();
        self.chain(c, F::one() / (lit::<F>(3.0) * c * c))
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    fn exp2(self) -> Self {
        let e = self.re.exp2();
        self.chain(e, e * F::LN_2())
    }

    fn exp_m1(self) -> Self { self.chain(self.re.exp_m1(), self.re.exp()) }
    fn ln(self) -> Self { self.chain(self.re.ln(), F::one() / self.re) }
    fn log2(self) -> Self { self.chain(self.re.log2(), F::one() / (self.re * F::LN_2())) }
    fn log10(self) -> Self { self.chain(self.re.log10(), F::one() / (self.re * F::LN_10())) }
    fn ln_1p(self) -> Self { self.chain(self.re.ln_1p(), F::one() / (F::one() + self.re)) }
    fn log(self, base: Self) -> Self { self.ln() / base.ln() }

    fn sin(self) -> Self { self.chain(self.re.sin(), self.re.cos()) }
    fn cos(self) -> Self { self.chain(self.re.cos(), -self.re.sin()) }

    fn tan(self) -> Self {
        let c = self.re.cos();
        self.chain(self.re.tan(), F::one() / (c * c))
    }

    fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.re.sin_cos();
        (self.chain(s, c), self.chain(c, -s))
    }

    fn asin(self) -> Self {
        self.chain(self.re.asin(), F::one() / (F::one() - self.re * self.re).sqrt())
    }

    fn acos(self) -> Self {
        self.chain(self.re.acos(), -F::one() / (F::one() - self.re * self.re).sqrt())
    }

    fn atan(self) -> Self {
        self.chain(self.re.atan(), F::one() / (F::one() + self.re * self.re))
    }

    fn atan2(self, other: Self) -> Self {
        let denom = self.re * self.re + other.re * other.re;
        Dual {
            re: self.re.atan2(other.re),
            eps: (other.re * self.eps - self.re * other.eps) / denom,
        }
    }

    fn sinh(self) -> Self { self.chain(self.re.sinh(), self.re.cosh()) }
    fn cosh(self) -> Self { self.chain(self.re.cosh(), self.re.sinh()) }

    fn tanh(self) -> Self {
        let t = self.re.tanh();
        self.chain(t, F::one() - t * t)
    }

    fn asinh(self) -> Self {
        self.chain(self.re.asinh(), F::one() / (self.re * self.re + F::one()).sqrt())
    }

    fn acosh(self) -> Self {
        self.chain(self.re.acosh(), F::one() / (self.re * self.re - F::one()).sqrt())
    }

    fn atanh(self) -> Self {
        self.chain(self.re.atanh(), F::one() / (F::one() - self.re * self.re))
    }

    fn hypot(self, other: Self) -> Self {
        let h = self.re.hypot(other.re);
        Dual {
            re: h,
            eps: (self.re * self.eps + other.re * other.eps) / h,
        }
    }

    fn max(self, other: Self) -> Self { if self.re >= other.re { self } else { other } }
    fn min(self, other: Self) -> Self { if self.re <= other.re { self } else { other } }

    fn abs_sub(self, other: Self) -> Self {
        if self.re > other.re { self - other } else { Self::zero() }
    }

    fn integer_decode(self) -> (u64, i16, i8) { self.re.integer_decode() }

    fn to_degrees(self) -> Self {
        self.chain(self.re.to_degrees(), lit::<F>(180.0) / F::PI())
    }

    fn to_radians(self) -> Self {
        self.chain(self.re.to_radians(), F::PI() / lit::<F>(180.0))
    }
}

// ══════════════════════════════════════════════
//  Active<F>
// ══════════════════════════════════════════════

impl<F: StackThreadLocal> NumFloat for Active<F> {
    fn nan() -> Self { Active::constant(F::nan()) }
    fn infinity() -> Self { Active::constant(F::infinity()) }
    fn neg_infinity() -> Self { Active::constant(F::neg_infinity()) }
    fn neg_zero() -> Self { Active::constant(F::neg_zero()) }

    fn min_value() -> Self { Active::constant(F::min_value()) }
    fn min_positive_value() -> Self { Active::constant(F::min_positive_value()) }
    fn max_value() -> Self { Active::constant(F::max_value()) }
    fn epsilon() -> Self { Active::constant(F::epsilon()) }

    fn is_nan(self) -> bool { self.value.is_nan() }
    fn is_infinite(self) -> bool { self.value.is_infinite() }
    fn is_finite(self) -> bool { self.value.is_finite() }
    fn is_normal(self) -> bool { self.value.is_normal() }
    fn is_sign_positive(self) -> bool { self.value.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.value.is_sign_negative() }
    fn classify(self) -> FpCategory { self.value.classify() }

    // Piecewise-constant functions have zero derivative and are not recorded.
    fn floor(self) -> Self { Active::constant(self.value.floor()) }
    fn ceil(self) -> Self { Active::constant(self.value.ceil()) }
    fn round(self) -> Self { Active::constant(self.value.round()) }
    fn trunc(self) -> Self { Active::constant(self.value.trunc()) }
    fn signum(self) -> Self { Active::constant(self.value.signum()) }

    fn fract(self) -> Self { self.unary(self.value.fract(), F::one()) }
    fn abs(self) -> Self { self.unary(self.value.abs(), self.value.signum()) }

    fn mul_add(self, a: Self, b: Self) -> Self {
        let x = self * a;
        x + b
    }

    fn recip(self) -> Self {
        let inv = F::one() / self.value;
        self.unary(inv, -inv * inv)
    }

    fn powi(self, n: i32) -> Self {
        let deriv = if n == 0 {
            F::zero()
        } else {
            lit::<F>(n as f64) * powi_pred(self.value, n)
        };
        self.unary(self.value.powi(n), deriv)
    }

    fn powf(self, n: Self) -> Self {
        let val = self.value.powf(n.value);
        let dx = n.value * self.value.powf(n.value - F::one());
        if n.is_constant() {
            return self.unary(val, dx);
        }
        let dy = val * self.value.ln();
        self.binary(n, val, dx, dy)
    }

    fn sqrt(self) -> Self {
        let s = self.value.sqrt();
        self.unary(s, F::one() / (lit::<F>(2.0) * s))
    }

    fn cbrt(self) -> Self {
        let c = self.value.cbrt();
        self.unary(c, F::one() / (lit::<F>(3.0) * c * c))
    }

    fn exp(self) -> Self {
        let e = self.value.exp();
        self.unary(e, e)
    }

    fn exp2(self) -> Self {
        let e = self.value.exp2();
        self.unary(e, e * F::LN_2())
    }

    fn exp_m1(self) -> Self { self.unary(self.value.exp_m1(), self.value.exp()) }
    fn ln(self) -> Self { self.unary(self.value.ln(), F::one() / self.value) }
    fn log2(self) -> Self { self.unary(self.value.log2(), F::one() / (self.value * F::LN_2())) }
    fn log10(self) -> Self { self.unary(self.value.log10(), F::one() / (self.value * F::LN_10())) }
    fn ln_1p(self) -> Self { self.unary(self.value.ln_1p(), F::one() / (F::one() + self.value)) }

    fn log(self, base: Self) -> Self {
        let (a, b) = (self.ln(), base.ln());
        a / b
    }

    fn sin(self) -> Self { self.unary(self.value.sin(), self.value.cos()) }
    fn cos(self) -> Self { self.unary(self.value.cos(), -self.value.sin()) }

    fn tan(self) -> Self {
        let c = self.value.cos();
        self.unary(self.value.tan(), F::one() / (c * c))
    }

    fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.value.sin_cos();
        (self.unary(s, c), self.unary(c, -s))
    }

    fn asin(self) -> Self {
        self.unary(self.value.asin(), F::one() / (F::one() - self.value * self.value).sqrt())
    }

    fn acos(self) -> Self {
        self.unary(self.value.acos(), -F::one() / (F::one() - self.value * self.value).sqrt())
    }

    fn atan(self) -> Self {
        self.unary(self.value.atan(), F::one() / (F::one() + self.value * self.value))
    }

    fn atan2(self, other: Self) -> Self {
        let denom = self.value * self.value + other.value * other.value;
        let dx = other.value / denom;
        let dy = -self.value / denom;
        self.binary(other, self.value.atan2(other.value), dx, dy)
    }

    fn sinh(self) -> Self { self.unary(self.value.sinh(), self.value.cosh()) }
    fn cosh(self) -> Self { self.unary(self.value.cosh(), self.value.sinh()) }

    fn tanh(self) -> Self {
        let t = self.value.tanh();
        self.unary(t, F::one() - t * t)
    }

    fn asinh(self) -> Self {
        self.unary(self.value.asinh(), F::one() / (self.value * self.value + F::one()).sqrt())
    }

    fn acosh(self) -> Self {
        self.unary(self.value.acosh(), F::one() / (self.value * self.value - F::one()).sqrt())
    }

    fn atanh(self) -> Self {
        self.unary(self.value.atanh(), F::one() / (F::one() - self.value * self.value))
    }

    fn hypot(self, other: Self) -> Self {
        let h = self.value.hypot(other.value);
        self.binary(other, h, self.value / h, other.value / h)
    }

    // Selecting an operand passes it through unchanged; no statement needed.
    fn max(self, other: Self) -> Self { if self.value >= other.value { self } else { other } }
    fn min(self, other: Self) -> Self { if self.value <= other.value { self } else { other } }

    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value { self - other } else { Self::zero() }
    }

    fn integer_decode(self) -> (u64, i16, i8) { self.value.integer_decode() }

    fn to_degrees(self) -> Self {
        self.unary(self.value.to_degrees(), lit::<F>(180.0) / F::PI())
    }

    fn to_radians(self) -> Self {
        self.unary(self.value.to_radians(), F::PI() / lit::<F>(180.0))
    }
}
