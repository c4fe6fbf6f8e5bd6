//! Closure-based entry points.
//!
//! Each function sets up a fresh recording context, evaluates the closure
//! once and returns derivatives. Reach for [`Stack`] or [`ActiveFunction`]
//! directly when the recording should be reused.

use crate::active::Active;
use crate::dual::Dual;
use crate::error::{AdError, Result};
use crate::float::Float;
use crate::stack::{Stack, StackGuard, StackThreadLocal, CONSTANT};

#[cfg(feature = "graph")]
use crate::function::{ActiveFunction, FunctionGuard, FunctionThreadLocal};
#[cfg(feature = "graph")]
use crate::trace::TraceVar;

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(AdError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Gradient of `f : R^n → R` at `x`, by one adjoint sweep.
///
/// ```
/// let g = adtape::grad(|x: &[adtape::Active<f64>]| {
///     x[0] * x[0] + x[1] * x[1]
/// }, &[3.0, 4.0]);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn grad<F: StackThreadLocal>(f: impl FnOnce(&[Active<F>]) -> Active<F>, x: &[F]) -> Vec<F> {
    let mut stack = Stack::with_capacity(x.len() * 10);
    let inputs: Vec<Active<F>> = x.iter().map(|&v| stack.variable(v)).collect();

    let mut guard = StackGuard::new(&mut stack);
    let output = f(&inputs);

    guard.set_gradient(output.index, F::one());
    guard.compute_adjoint();
    inputs.iter().map(|xi| guard.get_gradient(xi.index)).collect()
}

/// Vector-Jacobian product: returns `(f(x), wᵀ·J)`.
pub fn vjp<F: StackThreadLocal>(
    f: impl FnOnce(&[Active<F>]) -> Vec<Active<F>>,
    x: &[F],
    w: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    let mut stack = Stack::with_capacity(x.len() * 10);
    let inputs: Vec<Active<F>> = x.iter().map(|&v| stack.variable(v)).collect();

    let mut guard = StackGuard::new(&mut stack);
    let outputs = f(&inputs);
    check_len("vjp weights", outputs.len(), w.len())?;

    // Two outputs may share an index, so accumulate the seeds.
    for (y, &wi) in outputs.iter().zip(w) {
        let seeded = guard.get_gradient(y.index) + wi;
        guard.set_gradient(y.index, seeded);
    }
    guard.compute_adjoint();

    let values = outputs.iter().map(|y| y.value).collect();
    let grad = inputs.iter().map(|xi| guard.get_gradient(xi.index)).collect();
    Ok((values, grad))
}

/// Jacobian of `f : R^n → R^m` at `x`, recorded once on a fresh stack.
///
/// Returns `(f(x), J)` with `J` row-major `m × n`. The stack picks forward
/// or reverse sweeps by shape; passive outputs give zero rows.
pub fn jacobian<F: StackThreadLocal>(
    f: impl FnOnce(&[Active<F>]) -> Vec<Active<F>>,
    x: &[F],
) -> (Vec<F>, Vec<F>) {
    let n = x.len();
    let mut stack = Stack::with_capacity(n * 10);
    let inputs: Vec<Active<F>> = x.iter().map(|&v| stack.variable(v)).collect();

    let mut guard = StackGuard::new(&mut stack);
    let outputs = f(&inputs);
    let values: Vec<F> = outputs.iter().map(|y| y.value).collect();

    let active_rows: Vec<usize> = (0..outputs.len())
        .filter(|&i| outputs[i].index != CONSTANT)
        .collect();
    let deps: Vec<Active<F>> = active_rows.iter().map(|&i| outputs[i]).collect();

    guard.independent(&inputs);
    guard.dependent(&deps);
    let partial = guard.jacobian();

    let mut jac = vec![F::zero(); outputs.len() * n];
    for (k, &row) in active_rows.iter().enumerate() {
        jac[row * n..(row + 1) * n].copy_from_slice(&partial[k * n..(k + 1) * n]);
    }
    (values, jac)
}

/// Jacobian-vector product in forward mode: returns `(f(x), J·v)`.
pub fn jvp<F: Float>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
    v: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    check_len("jvp direction", x.len(), v.len())?;
    let inputs: Vec<Dual<F>> = x.iter().zip(v).map(|(&xi, &vi)| Dual::new(xi, vi)).collect();
    let outputs = f(&inputs);
    let values = outputs.iter().map(|d| d.re).collect();
    let tangents = outputs.iter().map(|d| d.eps).collect();
    Ok((values, tangents))
}

/// Jacobian of `f` in forward mode, one evaluation per input.
///
/// Returns `(f(x), J)` with `J` row-major `m × n`.
pub fn jacobian_dual<F: Float>(f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>, x: &[F]) -> (Vec<F>, Vec<F>) {
    let n = x.len();
    let passive: Vec<Dual<F>> = x.iter().map(|&xi| Dual::constant(xi)).collect();
    let values: Vec<F> = f(&passive).iter().map(|d| d.re).collect();
    let m = values.len();

    let mut jac = vec![F::zero(); m * n];
    for col in 0..n {
        let inputs: Vec<Dual<F>> = x
            .iter()
            .enumerate()
            .map(|(k, &xi)| if k == col { Dual::variable(xi) } else { Dual::constant(xi) })
            .collect();
        for (row, y) in f(&inputs).iter().enumerate().take(m) {
            jac[row * n + col] = y.eps;
        }
    }
    (values, jac)
}

#[cfg(feature = "graph")]
fn trace_inputs<F: FunctionThreadLocal>(func: &mut ActiveFunction<F>, x: &[F]) -> Vec<TraceVar<F>> {
    x.iter()
        .map(|&v| TraceVar::from_parts(v, func.new_input(v)))
        .collect()
}

#[cfg(feature = "graph")]
fn output_node<F: FunctionThreadLocal>(func: &mut ActiveFunction<F>, y: &TraceVar<F>) -> u32 {
    if y.index == CONSTANT {
        func.push_const(y.value)
    } else {
        y.index
    }
}

/// Record `f` into an [`ActiveFunction`] that can be replayed at other
/// inputs. Returns the function and `f(x)`.
///
/// ```
/// let (mut func, val) = adtape::record(|x| x[0] * x[0] + x[1] * x[1], &[3.0_f64, 4.0]);
/// assert!((val - 25.0).abs() < 1e-10);
/// let g = func.gradient(&[1.0, 2.0]).unwrap();
/// assert!((g[0] - 2.0).abs() < 1e-10);
/// assert!((g[1] - 4.0).abs() < 1e-10);
/// ```
#[cfg(feature = "graph")]
pub fn record<F: FunctionThreadLocal>(
    f: impl FnOnce(&[TraceVar<F>]) -> TraceVar<F>,
    x: &[F],
) -> (ActiveFunction<F>, F) {
    let mut func = ActiveFunction::with_capacity(x.len() * 10);
    let inputs = trace_inputs(&mut func, x);

    let output = {
        let _guard = FunctionGuard::new(&mut func);
        f(&inputs)
    };
    let node = output_node(&mut func, &output);
    func.set_outputs(&[node]);
    log::debug!("recorded function: {} inputs, {} nodes", x.len(), func.num_ops());
    (func, output.value)
}

/// Record a vector-valued `f : R^n → R^m`. Returns the function and `f(x)`.
#[cfg(feature = "graph")]
pub fn record_multi<F: FunctionThreadLocal>(
    f: impl FnOnce(&[TraceVar<F>]) -> Vec<TraceVar<F>>,
    x: &[F],
) -> (ActiveFunction<F>, Vec<F>) {
    let mut func = ActiveFunction::with_capacity(x.len() * 10);
    let inputs = trace_inputs(&mut func, x);

    let outputs = {
        let _guard = FunctionGuard::new(&mut func);
        f(&inputs)
    };
    let nodes: Vec<u32> = outputs.iter().map(|y| output_node(&mut func, y)).collect();
    func.set_outputs(&nodes);
    log::debug!(
        "recorded function: {} inputs, {} outputs, {} nodes",
        x.len(),
        nodes.len(),
        func.num_ops()
    );
    (func, outputs.iter().map(|y| y.value).collect())
}

/// Hessian-vector product of `f` at `x` along `v`: returns `(∇f, H·v)`.
#[cfg(feature = "graph")]
pub fn hvp<F: FunctionThreadLocal>(
    f: impl FnOnce(&[TraceVar<F>]) -> TraceVar<F>,
    x: &[F],
    v: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    let (func, _) = record(f, x);
    func.hvp(x, v)
}

/// Value, gradient and dense Hessian (row-major `n × n`) of `f` at `x`.
#[cfg(feature = "graph")]
pub fn hessian<F: FunctionThreadLocal>(
    f: impl FnOnce(&[TraceVar<F>]) -> TraceVar<F>,
    x: &[F],
) -> Result<(F, Vec<F>, Vec<F>)> {
    let (mut func, value) = record(f, x);
    let gradient = func.gradient(x)?;
    let hess = func.hessian(x)?;
    Ok((value, gradient, hess))
}
