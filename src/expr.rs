//! Lazy expression trees recorded as a single tape statement.
//!
//! Arithmetic on [`Active`] records one statement per operator. Building the
//! same computation as an [`Expr`] instead defers all work to
//! [`Expr::eval`], which walks the tree once to compute every intermediate
//! value, runs a local reverse pass over the tree to obtain the partial of
//! the root with respect to each leaf, and records exactly one statement
//! whose operands are the distinct active leaves.
//!
//! ```ignore
//! let fused = (x.expr() * y.expr() + z.expr()).sin().eval(); // 1 statement
//! let plain = (x * y + z).sin();                             // 3 statements
//! ```

use std::ops::{Add, Div, Mul, Neg, Range, Sub};

use crate::active::Active;
use crate::float::powi_pred;
use crate::stack::{self, StackThreadLocal, CONSTANT};
use crate::Float;

/// Process-unique identity of an [`ActiveArray`](crate::ActiveArray).
pub type ArrayId = u64;

/// Elementwise unary operation in an [`Expr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
    Tanh,
    Abs,
    Recip,
    Powi(i32),
}

/// Binary operation in an [`Expr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Powf,
}

/// A lazily evaluated expression over active leaves.
///
/// Leaves copy the value and gradient index of the active they were built
/// from. Leaves taken from an array element also remember the array and
/// offset, which is what [`is_aliased`](Self::is_aliased) inspects.
#[derive(Clone, Debug)]
pub enum Expr<F: Float> {
    Constant(F),
    Leaf {
        value: F,
        index: u32,
        origin: Option<(ArrayId, usize)>,
    },
    Unary(UnaryOp, Box<Expr<F>>),
    Binary(BinaryOp, Box<Expr<F>>, Box<Expr<F>>),
}

impl<F: Float> From<Active<F>> for Expr<F> {
    #[inline]
    fn from(x: Active<F>) -> Self {
        Expr::Leaf {
            value: x.value,
            index: x.index,
            origin: None,
        }
    }
}

impl<F: Float> From<F> for Expr<F> {
    #[inline]
    fn from(c: F) -> Self {
        Expr::Constant(c)
    }
}

/// Flattened tree node: operand slots refer to earlier nodes.
#[derive(Clone, Copy)]
enum Node {
    Leaf(u32),
    Const,
    Unary(UnaryOp, usize),
    Binary(BinaryOp, usize, usize),
}

/// Current storage of the array being assigned to, for live leaf reads.
pub(crate) struct LiveArray<'a, F> {
    pub(crate) id: ArrayId,
    pub(crate) values: &'a [F],
    pub(crate) indices: &'a [u32],
}

impl<F: Float> Expr<F> {
    /// A constant subexpression.
    #[inline]
    pub fn constant(c: F) -> Self {
        Expr::Constant(c)
    }

    pub(crate) fn array_leaf(value: F, index: u32, id: ArrayId, offset: usize) -> Self {
        Expr::Leaf {
            value,
            index,
            origin: Some((id, offset)),
        }
    }

    fn unary(self, op: UnaryOp) -> Self {
        Expr::Unary(op, Box::new(self))
    }

    fn binary(self, op: BinaryOp, rhs: Self) -> Self {
        Expr::Binary(op, Box::new(self), Box::new(rhs))
    }

    pub fn sqrt(self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn exp(self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    pub fn ln(self) -> Self {
        self.unary(UnaryOp::Ln)
    }

    pub fn sin(self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    pub fn cos(self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    pub fn tan(self) -> Self {
        self.unary(UnaryOp::Tan)
    }

    pub fn tanh(self) -> Self {
        self.unary(UnaryOp::Tanh)
    }

    pub fn abs(self) -> Self {
        self.unary(UnaryOp::Abs)
    }

    pub fn recip(self) -> Self {
        self.unary(UnaryOp::Recip)
    }

    pub fn powi(self, n: i32) -> Self {
        self.unary(UnaryOp::Powi(n))
    }

    pub fn powf(self, exponent: impl Into<Expr<F>>) -> Self {
        self.binary(BinaryOp::Powf, exponent.into())
    }

    /// Value of the expression. Records nothing.
    pub fn value(&self) -> F {
        match self {
            Expr::Constant(c) => *c,
            Expr::Leaf { value, .. } => *value,
            Expr::Unary(op, a) => unary_value(*op, a.value()),
            Expr::Binary(op, a, b) => binary_value(*op, a.value(), b.value()),
        }
    }

    /// Number of leaf occurrences, active or not.
    pub fn n_leaves(&self) -> usize {
        match self {
            Expr::Constant(_) => 0,
            Expr::Leaf { .. } => 1,
            Expr::Unary(_, a) => a.n_leaves(),
            Expr::Binary(_, a, b) => a.n_leaves() + b.n_leaves(),
        }
    }

    /// Whether any leaf reads element `range` of array `id`.
    pub fn is_aliased(&self, id: ArrayId, range: Range<usize>) -> bool {
        match self {
            Expr::Constant(_) => false,
            Expr::Leaf { origin, .. } => {
                matches!(origin, Some((a, off)) if *a == id && range.contains(off))
            }
            Expr::Unary(_, a) => a.is_aliased(id, range),
            Expr::Binary(_, a, b) => {
                a.is_aliased(id, range.clone()) || b.is_aliased(id, range)
            }
        }
    }

    /// Whether any leaf reads array `id` at all.
    pub fn references(&self, id: ArrayId) -> bool {
        self.is_aliased(id, 0..usize::MAX)
    }

    fn lower(&self, nodes: &mut Vec<Node>, values: &mut Vec<F>, live: Option<&LiveArray<'_, F>>) -> usize {
        let (node, value) = match self {
            Expr::Constant(c) => (Node::Const, *c),
            Expr::Leaf {
                value,
                index,
                origin,
            } => match (live, origin) {
                (Some(arr), Some((id, off))) if arr.id == *id => {
                    (Node::Leaf(arr.indices[*off]), arr.values[*off])
                }
                _ => (Node::Leaf(*index), *value),
            },
            Expr::Unary(op, a) => {
                let ia = a.lower(nodes, values, live);
                (Node::Unary(*op, ia), unary_value(*op, values[ia]))
            }
            Expr::Binary(op, a, b) => {
                let ia = a.lower(nodes, values, live);
                let ib = b.lower(nodes, values, live);
                (
                    Node::Binary(*op, ia, ib),
                    binary_value(*op, values[ia], values[ib]),
                )
            }
        };
        nodes.push(node);
        values.push(value);
        nodes.len() - 1
    }

    /// Value and `(gradient index, partial)` of every distinct active leaf.
    pub(crate) fn linearize(&self, live: Option<&LiveArray<'_, F>>) -> (F, Vec<(u32, F)>) {
        let mut nodes = Vec::new();
        let mut values = Vec::new();
        let root = self.lower(&mut nodes, &mut values, live);

        let mut adj = vec![F::zero(); nodes.len()];
        adj[root] = F::one();
        let mut operands: Vec<(u32, F)> = Vec::new();

        for i in (0..=root).rev() {
            let a = adj[i];
            match nodes[i] {
                Node::Const => {}
                Node::Leaf(index) => {
                    if index == CONSTANT {
                        continue;
                    }
                    match operands.iter_mut().find(|(idx, _)| *idx == index) {
                        Some(slot) => slot.1 = slot.1 + a,
                        None => operands.push((index, a)),
                    }
                }
                Node::Unary(op, ia) => {
                    let d = unary_partial(op, values[ia], values[i]);
                    adj[ia] = adj[ia] + a * d;
                }
                Node::Binary(op, ia, ib) => {
                    let (da, db) = binary_partials(op, values[ia], values[ib], values[i]);
                    adj[ia] = adj[ia] + a * da;
                    adj[ib] = adj[ib] + a * db;
                }
            }
        }
        (values[root], operands)
    }
}

impl<F: StackThreadLocal> Expr<F> {
    /// Evaluate and record the whole tree as one statement.
    ///
    /// Returns a passive result (and touches no stack) when no leaf is active.
    pub fn eval(&self) -> Active<F> {
        let (value, operands) = self.linearize(None);
        record(value, &operands)
    }
}

pub(crate) fn record<F: StackThreadLocal>(value: F, operands: &[(u32, F)]) -> Active<F> {
    if operands.is_empty() {
        return Active::constant(value);
    }
    let index = stack::with_active_stack(|s: &mut crate::Stack<F>| s.record_statement(operands));
    Active::from_parts(value, index)
}

fn unary_value<F: Float>(op: UnaryOp, x: F) -> F {
    match op {
        UnaryOp::Neg => -x,
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Ln => x.ln(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Tan => x.tan(),
        UnaryOp::Tanh => x.tanh(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Recip => x.recip(),
        UnaryOp::Powi(n) => x.powi(n),
    }
}

fn binary_value<F: Float>(op: BinaryOp, a: F, b: F) -> F {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Powf => a.powf(b),
    }
}

// Partials use the same formulas as the per-operator recording.
fn unary_partial<F: Float>(op: UnaryOp, x: F, r: F) -> F {
    let one = F::one();
    match op {
        UnaryOp::Neg => -one,
        UnaryOp::Sqrt => one / ((one + one) * r),
        UnaryOp::Exp => r,
        UnaryOp::Ln => one / x,
        UnaryOp::Sin => x.cos(),
        UnaryOp::Cos => -x.sin(),
        UnaryOp::Tan => {
            let c = x.cos();
            one / (c * c)
        }
        UnaryOp::Tanh => one - r * r,
        UnaryOp::Abs => x.signum(),
        UnaryOp::Recip => -r * r,
        UnaryOp::Powi(0) => F::zero(),
        UnaryOp::Powi(n) => F::from_i32(n).unwrap_or_else(F::nan) * powi_pred(x, n),
    }
}

fn binary_partials<F: Float>(op: BinaryOp, a: F, b: F, r: F) -> (F, F) {
    let one = F::one();
    match op {
        BinaryOp::Add => (one, one),
        BinaryOp::Sub => (one, -one),
        BinaryOp::Mul => (b, a),
        BinaryOp::Div => {
            let inv = one / b;
            (inv, -r * inv)
        }
        BinaryOp::Powf => (b * a.powf(b - one), r * a.ln()),
    }
}

// ── Operators ──

macro_rules! impl_expr_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<F: Float> $trait for Expr<F> {
            type Output = Expr<F>;
            #[inline]
            fn $method(self, rhs: Expr<F>) -> Expr<F> {
                self.binary($op, rhs)
            }
        }

        impl<F: Float> $trait<Active<F>> for Expr<F> {
            type Output = Expr<F>;
            #[inline]
            fn $method(self, rhs: Active<F>) -> Expr<F> {
                self.binary($op, Expr::from(rhs))
            }
        }

        impl<F: Float> $trait<Expr<F>> for Active<F> {
            type Output = Expr<F>;
            #[inline]
            fn $method(self, rhs: Expr<F>) -> Expr<F> {
                Expr::from(self).binary($op, rhs)
            }
        }

        impl $trait<f64> for Expr<f64> {
            type Output = Expr<f64>;
            #[inline]
            fn $method(self, rhs: f64) -> Expr<f64> {
                self.binary($op, Expr::Constant(rhs))
            }
        }

        impl $trait<Expr<f64>> for f64 {
            type Output = Expr<f64>;
            #[inline]
            fn $method(self, rhs: Expr<f64>) -> Expr<f64> {
                Expr::Constant(self).binary($op, rhs)
            }
        }

        impl $trait<f32> for Expr<f32> {
            type Output = Expr<f32>;
            #[inline]
            fn $method(self, rhs: f32) -> Expr<f32> {
                self.binary($op, Expr::Constant(rhs))
            }
        }

        impl $trait<Expr<f32>> for f32 {
            type Output = Expr<f32>;
            #[inline]
            fn $method(self, rhs: Expr<f32>) -> Expr<f32> {
                Expr::Constant(self).binary($op, rhs)
            }
        }
    };
}

impl_expr_binop!(Add, add, BinaryOp::Add);
impl_expr_binop!(Sub, sub, BinaryOp::Sub);
impl_expr_binop!(Mul, mul, BinaryOp::Mul);
impl_expr_binop!(Div, div, BinaryOp::Div);

impl<F: Float> Neg for Expr<F> {
    type Output = Expr<F>;
    #[inline]
    fn neg(self) -> Expr<F> {
        self.unary(UnaryOp::Neg)
    }
}
