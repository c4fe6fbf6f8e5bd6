//! Operator-overloading automatic differentiation on an operation tape.
//!
//! Arithmetic on [`Active`] values records one statement per operation onto
//! the thread's current [`Stack`]; [`Stack::compute_adjoint`] then sweeps
//! the statements backwards to produce gradients. [`Expr`] fuses a whole
//! right-hand side into a single statement, and [`ActiveArray`] hands out
//! in-place element references. With the `graph` feature, [`record`] builds
//! an [`ActiveFunction`] that can be replayed at new inputs and supports
//! forward-over-reverse Hessians.

pub mod active;
pub mod api;
pub mod array;
pub mod dual;
pub mod error;
pub mod expr;
pub mod float;
pub mod scalar;
pub mod stack;
mod traits;

#[cfg(feature = "graph")]
pub mod function;
#[cfg(feature = "graph")]
pub mod opcode;
#[cfg(feature = "graph")]
pub mod trace;

pub use active::Active;
pub use api::{grad, jacobian, jacobian_dual, jvp, vjp};
pub use array::{ActiveArray, ActiveRef, ActiveRefMut};
pub use dual::Dual;
pub use error::{AdError, Result};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use float::Float;
pub use scalar::Scalar;
pub use stack::{Growth, Stack, StackConfig, StackGuard, CONSTANT};

#[cfg(feature = "graph")]
pub use api::{hessian, hvp, record, record_multi};
#[cfg(feature = "graph")]
pub use function::{ActiveFunction, FunctionGuard};
#[cfg(feature = "graph")]
pub use opcode::OpCode;
#[cfg(feature = "graph")]
pub use trace::TraceVar;

/// Active scalar over `f64`.
pub type Adouble = Active<f64>;
/// Active scalar over `f32`.
pub type Afloat = Active<f32>;
/// Forward-mode dual number over `f64`.
pub type Dual64 = Dual<f64>;
/// Forward-mode dual number over `f32`.
pub type Dual32 = Dual<f32>;
