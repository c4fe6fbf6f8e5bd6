#![cfg(feature = "graph")]

use adtape::{record, record_multi, ActiveFunction, AdError, OpCode, Scalar};
use approx::assert_relative_eq;
use num_traits::Float;

fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let one = T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(1.0).unwrap());
    let hundred = T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(100.0).unwrap());
    let dx = x[0] - one;
    let t = x[1] - x[0] * x[0];
    dx * dx + hundred * t * t
}

fn rosenbrock_grad(x: [f64; 2]) -> [f64; 2] {
    let t = x[1] - x[0] * x[0];
    [2.0 * (x[0] - 1.0) - 400.0 * x[0] * t, 200.0 * t]
}

// ── Replay ──

#[test]
fn replay_at_new_point() {
    let (mut func, val) = record(|v| rosenbrock(v), &[1.5_f64, 2.5]);
    assert_relative_eq!(val, 0.25 + 100.0 * 0.0625, max_relative = 1e-12);

    let y = func.eval(&[0.0, 1.0]).unwrap();
    assert_relative_eq!(y[0], 101.0, max_relative = 1e-12);

    for x in [[0.3, -0.7], [2.0, 3.0], [1.0, 1.0]] {
        let g = func.gradient(&x).unwrap();
        let expected = rosenbrock_grad(x);
        assert_relative_eq!(g[0], expected[0], max_relative = 1e-12, epsilon = 1e-12);
        assert_relative_eq!(g[1], expected[1], max_relative = 1e-12, epsilon = 1e-12);
    }
}

#[test]
fn graph_gradient_matches_stack_gradient() {
    let x = [0.4_f64, 1.7];
    let (mut func, _) = record(|v| rosenbrock(v), &x);
    let from_graph = func.gradient(&x).unwrap();
    let from_stack = adtape::grad(|v| rosenbrock(v), &x);
    assert_relative_eq!(from_graph[0], from_stack[0], max_relative = 1e-14);
    assert_relative_eq!(from_graph[1], from_stack[1], max_relative = 1e-14);
}

fn every_elemental<T: Scalar>(v: &[T]) -> T {
    use num_traits::FromPrimitive;
    let (a, b) = (v[0], v[1]);
    let three = T::from_f64(3.0).unwrap();
    a.sqrt() * b.exp() + a.cbrt() - (a.ln() + b.log2() + b.log10() + a.ln_1p())
        + a.exp2() * b.exp_m1()
        + a.sin() * b.cos()
        + a.tan()
        + a.asin()
        + a.acos() * a.atan()
        + a.sinh() * b.cosh()
        + b.tanh()
        + a.asinh()
        + b.acosh()
        + a.atanh()
        + (-a).abs() * b.recip()
        + a.powf(b)
        + a.atan2(b)
        + a.hypot(b)
        + a.max(b) * a.min(b)
        + b % a
        + a / b
        + b.fract() * three
        + b.floor()
        + a.powi(3)
}

#[test]
fn every_elemental_matches_stack_and_differences() {
    let x = [0.4_f64, 1.7];
    let (mut func, val) = record(|v| every_elemental(v), &x);
    assert_relative_eq!(val, every_elemental(&x), max_relative = 1e-14);

    let from_graph = func.gradient(&x).unwrap();
    let from_stack = adtape::grad(|v| every_elemental(v), &x);
    for (g, s) in from_graph.iter().zip(&from_stack) {
        assert_relative_eq!(g, s, max_relative = 1e-10);
    }

    let h = 1e-5;
    let hess = func.hessian(&x).unwrap();
    for j in 0..2 {
        let mut xp = x;
        let mut xm = x;
        xp[j] += h;
        xm[j] -= h;
        let gp = adtape::grad(|v| every_elemental(v), &xp);
        let gm = adtape::grad(|v| every_elemental(v), &xm);
        for i in 0..2 {
            let fd = (gp[i] - gm[i]) / (2.0 * h);
            assert_relative_eq!(hess[i * 2 + j], fd, max_relative = 1e-5, epsilon = 1e-7);
        }
    }
}

#[test]
fn vjp_and_jvp() {
    let x = [1.0_f64, 2.0, 3.0];
    let (mut func, _) = record_multi(|v| vec![v[0] * v[1], v[1] * v[2]], &x);

    // J = [[2, 1, 0], [0, 3, 2]]
    let w = func.vjp(&x, &[1.0, -1.0]).unwrap();
    assert_eq!(w, vec![2.0, -2.0, -2.0]);

    let jv = func.jvp(&x, &[1.0, 0.0, 1.0]).unwrap();
    assert_eq!(jv, vec![2.0, 2.0]);
}

#[test]
fn jacobian_forward_and_reverse_agree() {
    let x = [0.5_f64, -1.2, 2.0];
    let (mut func, vals) = record_multi(
        |v| vec![v[0].sin() * v[1], v[1].exp() + v[2] * v[2], v[0] / v[2]],
        &x,
    );
    assert_eq!(vals.len(), 3);

    let rev = func.jacobian(&x).unwrap();
    let fwd = func.jacobian_forward(&x).unwrap();
    assert_eq!(rev.len(), 9);
    for (r, f) in rev.iter().zip(&fwd) {
        assert_relative_eq!(*r, *f, max_relative = 1e-14, epsilon = 1e-15);
    }
    // Row 0: d(sin(x0) x1)/dx0 = cos(x0) x1.
    assert_relative_eq!(rev[0], x[0].cos() * x[1], max_relative = 1e-14);
    // Row 2: d(x0/x2)/dx2 = -x0/x2².
    assert_relative_eq!(rev[8], -x[0] / (x[2] * x[2]), max_relative = 1e-14);
}

#[test]
fn constant_output_is_recorded() {
    let (mut func, vals) = record_multi(|v| vec![v[0] * 2.0, adtape::TraceVar::constant(5.0)], &[1.0_f64]);
    assert_eq!(vals, vec![2.0, 5.0]);
    assert_eq!(func.eval(&[4.0]).unwrap(), vec![8.0, 5.0]);
    assert_eq!(func.jacobian(&[4.0]).unwrap(), vec![2.0, 0.0]);
}

// ── Construction-time simplification ──

#[test]
fn identity_multiplication_folds_away() {
    let (mut func, _) = record(|v| v[0] * 1.0, &[2.0_f64]);
    // The constant operand is left unreferenced.
    assert_eq!(func.output_indices(), &[0u32]);
    func.optimize();
    assert_eq!(func.num_ops(), 1);
    assert_eq!(func.gradient(&[7.0]).unwrap(), vec![1.0]);
}

#[test]
fn constant_subexpressions_fold() {
    let (func, _) = record(
        |v| {
            let c = adtape::TraceVar::constant(2.0_f64);
            v[0] * (c * c).exp()
        },
        &[1.0],
    );
    let ops = func.opcodes();
    assert!(!ops.contains(&OpCode::Exp));
    assert_eq!(ops.iter().filter(|&&op| op == OpCode::Mul).count(), 1);
}

#[test]
fn self_subtraction_folds_to_constant() {
    let (mut func, val) = record(|v| v[0] - v[0], &[3.0_f64]);
    assert_eq!(val, 0.0);
    assert_eq!(func.gradient(&[5.0]).unwrap(), vec![0.0]);
}

// ── Powi ──

#[test]
fn negative_powi_f32() {
    let (mut func, val) = record(|v| v[0].powi(-2), &[2.0_f32]);
    assert_relative_eq!(val, 0.25);
    let g = func.gradient(&[3.0]).unwrap();
    assert_relative_eq!(g[0], -2.0 / 27.0, max_relative = 1e-6);
    assert_relative_eq!(func.output_value(), 1.0 / 9.0, max_relative = 1e-6);
}

#[test]
fn powi_special_exponents() {
    let (func, _) = record(|v| v[0].powi(1) + v[0].powi(-1), &[2.0_f64]);
    assert!(func.opcodes().contains(&OpCode::Recip));
    assert!(!func.opcodes().contains(&OpCode::Powi));

    let (mut cube, _) = record(|v| v[0].powi(3), &[2.0_f64]);
    assert_relative_eq!(cube.gradient(&[-1.5]).unwrap()[0], 3.0 * 2.25);
}

#[test]
fn powi_with_most_negative_exponent() {
    let (mut func, val) = record(|v| v[0].powi(i32::MIN), &[1.0_f64]);
    assert_eq!(val, 1.0);
    assert_eq!(func.gradient(&[1.0]).unwrap(), vec![i32::MIN as f64]);
    assert_eq!(func.hessian(&[1.0]).unwrap().len(), 1);
}

// ── Rem ──

#[test]
fn rem_derivative_wrt_divisor() {
    let x = [7.5_f64, 2.0];
    let (mut func, val) = record(|v| v[0] % v[1], &x);
    assert_eq!(val, 1.5);
    assert_eq!(func.gradient(&x).unwrap(), vec![1.0, -3.0]);

    let g = adtape::grad(|v| v[0] % v[1], &x);
    assert_eq!(g, vec![1.0, -3.0]);

    let (_, jac) = adtape::jacobian_dual(|v| vec![v[0] % v[1]], &x);
    assert_eq!(jac, vec![1.0, -3.0]);
}

#[test]
fn constant_rem_variable() {
    let (mut func, val) = record(|v| 7.5 % v[0], &[2.0_f64]);
    assert_eq!(val, 1.5);
    assert_eq!(func.gradient(&[2.0]).unwrap(), vec![-3.0]);
}

// ── Hessians ──

fn exp_product_hessian(x: [f64; 2]) -> [f64; 4] {
    let e = (x[0] * x[1]).exp();
    let cross = (1.0 + x[0] * x[1]) * e;
    [x[1] * x[1] * e, cross, cross, x[0] * x[0] * e]
}

#[test]
fn hessian_of_exp_product() {
    let x = [0.3_f64, -0.8];
    let (func, _) = record(|v| (v[0] * v[1]).exp(), &[1.0, 1.0]);
    let h = func.hessian(&x).unwrap();
    let expected = exp_product_hessian(x);
    for (a, b) in h.iter().zip(&expected) {
        assert_relative_eq!(*a, *b, max_relative = 1e-13);
    }
}

#[test]
fn hvp_matches_dense_hessian() {
    let x = [1.2_f64, 0.4];
    let v = [0.5, -2.0];
    let (func, _) = record(|v| rosenbrock(v), &x);
    let (g, hv) = func.hvp(&x, &v).unwrap();
    let h = func.hessian(&x).unwrap();

    let expected_g = rosenbrock_grad(x);
    assert_relative_eq!(g[0], expected_g[0], max_relative = 1e-12);
    assert_relative_eq!(g[1], expected_g[1], max_relative = 1e-12);
    for i in 0..2 {
        let dense = h[i * 2] * v[0] + h[i * 2 + 1] * v[1];
        assert_relative_eq!(hv[i], dense, max_relative = 1e-12);
    }
}

#[test]
fn hessian_is_symmetric() {
    let x = [0.7_f64, -0.3, 1.1];
    let (func, _) = record(|v| (v[0] * v[1]).sin() * v[2].exp() + v[0].powi(3) / v[2], &x);
    let h = func.hessian(&x).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert_relative_eq!(h[i * 3 + j], h[j * 3 + i], max_relative = 1e-12, epsilon = 1e-14);
        }
    }
}

#[test]
fn weighted_hessian() {
    let x = [1.5_f64, -0.5];
    let (func, _) = record_multi(|v| vec![v[0] * v[1], v[0] * v[0]], &x);
    let h = func.hessian_weighted(&x, &[2.0, 3.0]).unwrap();
    assert_eq!(h, vec![6.0, 2.0, 2.0, 0.0]);
}

#[test]
fn closure_hessian_and_hvp() {
    let x = [0.3_f64, -0.8];
    let (value, g, h) = adtape::hessian(|v| (v[0] * v[1]).exp(), &x).unwrap();
    let e = (x[0] * x[1]).exp();
    assert_relative_eq!(value, e);
    assert_relative_eq!(g[0], x[1] * e, max_relative = 1e-14);
    assert_relative_eq!(g[1], x[0] * e, max_relative = 1e-14);
    let expected = exp_product_hessian(x);
    for (a, b) in h.iter().zip(&expected) {
        assert_relative_eq!(*a, *b, max_relative = 1e-13);
    }

    let (_, hv) = adtape::hvp(|v| (v[0] * v[1]).exp(), &x, &[1.0, 0.0]).unwrap();
    assert_relative_eq!(hv[0], expected[0], max_relative = 1e-13);
    assert_relative_eq!(hv[1], expected[2], max_relative = 1e-13);
}

// ── Optimization passes ──

#[test]
fn cse_merges_commuted_products() {
    let x = [0.6_f64, 1.3];
    let (mut func, _) = record(|v| (v[0] * v[1]).sin() + (v[1] * v[0]).sin(), &x);
    assert_eq!(func.num_ops(), 7);
    let before = func.gradient(&x).unwrap();

    func.cse();
    assert_eq!(func.num_ops(), 5);
    let after = func.gradient(&x).unwrap();
    assert_relative_eq!(before[0], after[0], max_relative = 1e-14);
    assert_relative_eq!(after[0], 2.0 * (x[0] * x[1]).cos() * x[1], max_relative = 1e-14);
}

#[test]
fn dce_removes_unused_nodes() {
    let x = [0.6_f64, 1.3];
    let (mut func, _) = record(
        |v| {
            let _unused = v[0].exp();
            v[0] * v[1]
        },
        &x,
    );
    assert_eq!(func.num_ops(), 4);
    func.dead_code_elimination();
    assert_eq!(func.num_ops(), 3);
    assert_eq!(func.gradient(&[2.0, 5.0]).unwrap(), vec![5.0, 2.0]);
}

#[test]
fn unused_inputs_survive_optimization() {
    let (mut func, _) = record(|v| v[1] * v[1], &[1.0_f64, 2.0, 3.0]);
    func.optimize();
    assert_eq!(func.num_inputs(), 3);
    assert_eq!(func.gradient(&[1.0, 4.0, 9.0]).unwrap(), vec![0.0, 8.0, 0.0]);
}

// ── Errors ──

#[test]
fn dimension_errors() {
    let (mut func, _) = record(|v| v[0] * v[1], &[1.0_f64, 2.0]);
    assert_eq!(
        func.gradient(&[1.0]),
        Err(AdError::DimensionMismatch {
            what: "function inputs",
            expected: 2,
            found: 1,
        })
    );
    assert!(func.hvp(&[1.0, 2.0], &[1.0]).is_err());
    assert!(func.vjp(&[1.0, 2.0], &[1.0, 1.0]).is_err());
    assert!(func.hessian_weighted(&[1.0, 2.0], &[]).is_err());
}

#[test]
fn function_without_outputs() {
    let mut func = ActiveFunction::<f64>::new();
    func.new_input(1.0);
    assert!(matches!(
        func.gradient(&[1.0]),
        Err(AdError::DimensionMismatch { what: "function outputs", .. })
    ));
    assert!(func.hessian(&[1.0]).is_err());
}

#[test]
fn manual_construction() {
    let mut func = ActiveFunction::<f64>::new();
    let x = func.new_input(2.0);
    let y = func.new_input(3.0);
    let xy = func.push_op(OpCode::Mul, x, y, 6.0);
    let s = func.push_op(OpCode::Sin, xy, u32::MAX, 6.0_f64.sin());
    func.set_outputs(&[s]);

    let g = func.gradient(&[2.0, 3.0]).unwrap();
    assert_relative_eq!(g[0], 3.0 * 6.0_f64.cos(), max_relative = 1e-14);
    assert_relative_eq!(g[1], 2.0 * 6.0_f64.cos(), max_relative = 1e-14);
}

#[test]
#[should_panic(expected = "No active function")]
fn trace_ops_need_a_recording() {
    let a = adtape::TraceVar::from_parts(1.0_f64, 0);
    let _ = a.sin();
}
