//! Opcodes of the recorded graph.
//!
//! Each opcode is one elementary operation. [`eval_forward`] and
//! [`reverse_partials`] evaluate and differentiate a single opcode; both are
//! generic over `num_traits::Float` so the same code runs on plain floats
//! during replay and on [`Dual`](crate::Dual) numbers during
//! forward-over-reverse Hessian sweeps.

use num_traits::Float;

use crate::float::powi_pred;

/// Sentinel in the second argument slot of unary ops.
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes.
///
/// Binary ops use both argument slots; unary ops use slot 0 only (slot 1 is
/// [`UNUSED`], except for [`OpCode::Powi`] which stores its `i32` exponent
/// there, reinterpreted as `u32`).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    /// Independent variable.
    Input,
    /// Scalar constant.
    Const,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Powf,
    Atan2,
    Hypot,
    Max,
    Min,

    Neg,
    Recip,
    Sqrt,
    Cbrt,
    /// Integer power. Exponent stored in the second argument slot.
    Powi,
    Exp,
    Exp2,
    ExpM1,
    Ln,
    Log2,
    Log10,
    Ln1p,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Abs,
    // Piecewise constant: zero partials, recorded so replay reproduces the value.
    Signum,
    Floor,
    Ceil,
    Round,
    Trunc,
    Fract,
}

impl OpCode {
    /// Whether the second argument slot refers to another node.
    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Rem
                | OpCode::Powf
                | OpCode::Atan2
                | OpCode::Hypot
                | OpCode::Max
                | OpCode::Min
        )
    }

    /// Whether operand order is irrelevant (used by CSE).
    #[inline]
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            OpCode::Add | OpCode::Mul | OpCode::Max | OpCode::Min | OpCode::Hypot
        )
    }
}

#[inline]
fn lit<T: Float>(x: f64) -> T {
    T::from(x).unwrap_or_else(T::nan)
}

/// Evaluate a single opcode in the forward direction.
///
/// For unary ops `b` is ignored, except [`OpCode::Powi`] where `b` holds
/// the exponent as a float.
///
/// # Panics
///
/// Panics on [`OpCode::Input`] and [`OpCode::Const`]; their values are set
/// directly by the sweep.
#[inline]
pub fn eval_forward<T: Float>(op: OpCode, a: T, b: T) -> T {
    use OpCode::*;
    match op {
        Input | Const => unreachable!("leaf nodes are seeded, not evaluated"),
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => a / b,
        Rem => a % b,
        Powf => a.powf(b),
        Atan2 => a.atan2(b),
        Hypot => a.hypot(b),
        // Ties go to `a`, matching the partials below.
        Max => if a >= b { a } else { b },
        Min => if a <= b { a } else { b },
        Neg => -a,
        Recip => a.recip(),
        Sqrt => a.sqrt(),
        Cbrt => a.cbrt(),
        Powi => a.powi(b.to_i32().unwrap_or(0)),
        Exp => a.exp(),
        Exp2 => a.exp2(),
        ExpM1 => a.exp_m1(),
        Ln => a.ln(),
        Log2 => a.log2(),
        Log10 => a.log10(),
        Ln1p => a.ln_1p(),
        Sin => a.sin(),
        Cos => a.cos(),
        Tan => a.tan(),
        Asin => a.asin(),
        Acos => a.acos(),
        Atan => a.atan(),
        Sinh => a.sinh(),
        Cosh => a.cosh(),
        Tanh => a.tanh(),
        Asinh => a.asinh(),
        Acosh => a.acosh(),
        Atanh => a.atanh(),
        Abs => a.abs(),
        Signum => a.signum(),
        Floor => a.floor(),
        Ceil => a.ceil(),
        Round => a.round(),
        Trunc => a.trunc(),
        Fract => a.fract(),
    }
}

/// Partial derivatives `(∂r/∂a, ∂r/∂b)` of a single opcode.
///
/// `a`, `b` are the operand values and `r` the result. For unary ops the
/// second partial is zero.
#[inline]
pub fn reverse_partials<T: Float>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let (zero, one) = (T::zero(), T::one());
    match op {
        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => (b.recip(), -r / b),
        OpCode::Rem => (one, -(a / b).trunc()),
        OpCode::Powf => (b * a.powf(b - one), r * a.ln()),
        OpCode::Atan2 => {
            let h = a * a + b * b;
            (b / h, -a / h)
        }
        OpCode::Hypot => (a / r, b / r),
        OpCode::Max if a >= b => (one, zero),
        OpCode::Min if a <= b => (one, zero),
        OpCode::Max | OpCode::Min => (zero, one),
        _ => (unary_partial(op, a, b, r), zero),
    }
}

fn unary_partial<T: Float>(op: OpCode, a: T, b: T, r: T) -> T {
    use OpCode::*;
    let one = T::one();
    let two = one + one;
    match op {
        Input | Const | Signum | Floor | Ceil | Round | Trunc => T::zero(),
        Neg => -one,
        Recip => -r * r,
        Sqrt => (two * r).recip(),
        Cbrt => (lit::<T>(3.0) * r * r).recip(),
        Powi => match b.to_i32() {
            Some(n) if n != 0 => b * powi_pred(a, n),
            _ => T::zero(),
        },
        Exp => r,
        Exp2 => r * two.ln(),
        ExpM1 => r + one,
        Ln => a.recip(),
        Log2 => (a * two.ln()).recip(),
        Log10 => (a * lit::<T>(10.0).ln()).recip(),
        Ln1p => (one + a).recip(),
        Sin => a.cos(),
        Cos => -a.sin(),
        Tan => one + r * r,
        Asin => (one - a * a).sqrt().recip(),
        Acos => -(one - a * a).sqrt().recip(),
        Atan => (one + a * a).recip(),
        Sinh => a.cosh(),
        Cosh => a.sinh(),
        Tanh => one - r * r,
        Asinh => (a * a + one).sqrt().recip(),
        Acosh => (a * a - one).sqrt().recip(),
        Atanh => (one - a * a).recip(),
        Abs => a.signum(),
        Fract => one,
        Add | Sub | Mul | Div | Rem | Powf | Atan2 | Hypot | Max | Min => {
            unreachable!("{op:?} has two partials")
        }
    }
}

/// Encode a `powi` exponent for the second argument slot.
#[inline]
pub fn powi_exp_encode(exp: i32) -> u32 {
    exp as u32
}

/// Decode a `powi` exponent from the second argument slot.
#[inline]
pub fn powi_exp_decode(slot: u32) -> i32 {
    slot as i32
}
