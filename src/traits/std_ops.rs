use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::active::Active;
use crate::dual::Dual;
use crate::float::Float;
use crate::stack::StackThreadLocal;

// ──────────────────────────────────────────────
//  Dual<F> operators
// ──────────────────────────────────────────────

impl<F: Float> Add for Dual<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<F: Float> Sub for Dual<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<F: Float> Mul for Dual<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl<F: Float> Div for Dual<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = F::one() / rhs.re;
        Dual {
            re: self.re * inv,
            eps: (self.eps * rhs.re - self.re * rhs.eps) * inv * inv,
        }
    }
}

impl<F: Float> Neg for Dual<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl<F: Float> Rem for Dual<F> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        // a % b = a - trunc(a / b) * b, piecewise linear in both.
        Dual {
            re: self.re % rhs.re,
            eps: self.eps - (self.re / rhs.re).trunc() * rhs.eps,
        }
    }
}

impl<F: Float> AddAssign for Dual<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: Float> SubAssign for Dual<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: Float> MulAssign for Dual<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: Float> DivAssign for Dual<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<F: Float> RemAssign for Dual<F> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

macro_rules! impl_dual_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Dual<$f> {
                self + Dual::constant(rhs)
            }
        }

        impl Add<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn add(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual::constant(self) + rhs
            }
        }

        impl Sub<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Dual<$f> {
                self - Dual::constant(rhs)
            }
        }

        impl Sub<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn sub(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual::constant(self) - rhs
            }
        }

        impl Mul<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Dual<$f> {
                Dual {
                    re: self.re * rhs,
                    eps: self.eps * rhs,
                }
            }
        }

        impl Mul<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn mul(self, rhs: Dual<$f>) -> Dual<$f> {
                rhs * self
            }
        }

        impl Div<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Dual<$f> {
                let inv = 1.0 / rhs;
                self * inv
            }
        }

        impl Div<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn div(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual::constant(self) / rhs
            }
        }

        impl Rem<$f> for Dual<$f> {
            type Output = Dual<$f>;
            #[inline]
            fn rem(self, rhs: $f) -> Dual<$f> {
                self % Dual::constant(rhs)
            }
        }

        impl Rem<Dual<$f>> for $f {
            type Output = Dual<$f>;
            #[inline]
            fn rem(self, rhs: Dual<$f>) -> Dual<$f> {
                Dual::constant(self) % rhs
            }
        }
    };
}

impl_dual_scalar_ops!(f32);
impl_dual_scalar_ops!(f64);

impl<F: Float> PartialEq for Dual<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl<F: Float> PartialOrd for Dual<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

// ──────────────────────────────────────────────
//  Active<F> operators
// ──────────────────────────────────────────────

impl<F: StackThreadLocal> Add for Active<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.binary(rhs, self.value + rhs.value, F::one(), F::one())
    }
}

impl<F: StackThreadLocal> Sub for Active<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.binary(rhs, self.value - rhs.value, F::one(), -F::one())
    }
}

impl<F: StackThreadLocal> Mul for Active<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<F: StackThreadLocal> Div for Active<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = F::one() / rhs.value;
        let value = self.value * inv;
        self.binary(rhs, value, inv, -value * inv)
    }
}

impl<F: StackThreadLocal> Neg for Active<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.unary(-self.value, -F::one())
    }
}

impl<F: StackThreadLocal> Rem for Active<F> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        let q = (self.value / rhs.value).trunc();
        self.binary(rhs, self.value % rhs.value, F::one(), -q)
    }
}

impl<F: StackThreadLocal> AddAssign for Active<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: StackThreadLocal> SubAssign for Active<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: StackThreadLocal> MulAssign for Active<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: StackThreadLocal> DivAssign for Active<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<F: StackThreadLocal> RemAssign for Active<F> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// Mixed ops with primitive floats record a single-operand statement.
macro_rules! impl_active_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Active<$f> {
                self.unary(self.value + rhs, 1.0)
            }
        }

        impl Add<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn add(self, rhs: Active<$f>) -> Active<$f> {
                rhs.unary(self + rhs.value, 1.0)
            }
        }

        impl Sub<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Active<$f> {
                self.unary(self.value - rhs, 1.0)
            }
        }

        impl Sub<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn sub(self, rhs: Active<$f>) -> Active<$f> {
                rhs.unary(self - rhs.value, -1.0)
            }
        }

        impl Mul<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Active<$f> {
                self.unary(self.value * rhs, rhs)
            }
        }

        impl Mul<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn mul(self, rhs: Active<$f>) -> Active<$f> {
                rhs.unary(self * rhs.value, self)
            }
        }

        impl Div<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Active<$f> {
                let inv = 1.0 / rhs;
                self.unary(self.value * inv, inv)
            }
        }

        impl Div<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn div(self, rhs: Active<$f>) -> Active<$f> {
                let inv = 1.0 / rhs.value;
                let value = self * inv;
                rhs.unary(value, -value * inv)
            }
        }

        impl Rem<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn rem(self, rhs: $f) -> Active<$f> {
                self.unary(self.value % rhs, 1.0)
            }
        }

        impl Rem<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn rem(self, rhs: Active<$f>) -> Active<$f> {
                rhs.unary(self % rhs.value, -(self / rhs.value).trunc())
            }
        }

        impl AddAssign<$f> for Active<$f> {
            #[inline]
            fn add_assign(&mut self, rhs: $f) {
                *self = *self + rhs;
            }
        }

        impl SubAssign<$f> for Active<$f> {
            #[inline]
            fn sub_assign(&mut self, rhs: $f) {
                *self = *self - rhs;
            }
        }

        impl MulAssign<$f> for Active<$f> {
            #[inline]
            fn mul_assign(&mut self, rhs: $f) {
                *self = *self * rhs;
            }
        }

        impl DivAssign<$f> for Active<$f> {
            #[inline]
            fn div_assign(&mut self, rhs: $f) {
                *self = *self / rhs;
            }
        }

        impl PartialEq<$f> for Active<$f> {
            #[inline]
            fn eq(&self, other: &$f) -> bool {
                self.value == *other
            }
        }

        impl PartialOrd<$f> for Active<$f> {
            #[inline]
            fn partial_cmp(&self, other: &$f) -> Option<std::cmp::Ordering> {
                self.value.partial_cmp(other)
            }
        }
    };
}

impl_active_scalar_ops!(f32);
impl_active_scalar_ops!(f64);

// Comparisons see values only and never record.
impl<F: Float> PartialEq for Active<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Active<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
