//! Recorded derivatives of every operator against central differences.

use adtape::{Active, Dual, Scalar};
use approx::assert_relative_eq;
use num_traits::{Float, FloatConst, FromPrimitive};

const H: f64 = 1e-6;

macro_rules! check_unary {
    ($x:expr, |$v:ident| $body:expr) => {{
        let x0: f64 = $x;
        let g = adtape::grad(|xs: &[Active<f64>]| {
            let $v = xs[0];
            $body
        }, &[x0]);
        let f = |$v: f64| $body;
        let fd = (f(x0 + H) - f(x0 - H)) / (2.0 * H);
        assert_relative_eq!(g[0], fd, max_relative = 1e-5, epsilon = 1e-8);
    }};
}

macro_rules! check_binary {
    ($x:expr, $y:expr, |$a:ident, $b:ident| $body:expr) => {{
        let (x0, y0): (f64, f64) = ($x, $y);
        let g = adtape::grad(|xs: &[Active<f64>]| {
            let ($a, $b) = (xs[0], xs[1]);
            $body
        }, &[x0, y0]);
        let f = |$a: f64, $b: f64| $body;
        let fdx = (f(x0 + H, y0) - f(x0 - H, y0)) / (2.0 * H);
        let fdy = (f(x0, y0 + H) - f(x0, y0 - H)) / (2.0 * H);
        assert_relative_eq!(g[0], fdx, max_relative = 1e-5, epsilon = 1e-8);
        assert_relative_eq!(g[1], fdy, max_relative = 1e-5, epsilon = 1e-8);
    }};
}

#[test]
fn unary_functions() {
    check_unary!(0.7, |x| -x);
    check_unary!(0.7, |x| x.sqrt());
    check_unary!(0.7, |x| x.cbrt());
    check_unary!(0.7, |x| x.recip());
    check_unary!(0.7, |x| x.exp());
    check_unary!(0.7, |x| x.exp2());
    check_unary!(0.7, |x| x.exp_m1());
    check_unary!(0.7, |x| x.ln());
    check_unary!(0.7, |x| x.log2());
    check_unary!(0.7, |x| x.log10());
    check_unary!(0.7, |x| x.ln_1p());
    check_unary!(0.7, |x| x.sin());
    check_unary!(0.7, |x| x.cos());
    check_unary!(0.7, |x| x.tan());
    check_unary!(0.4, |x| x.asin());
    check_unary!(0.4, |x| x.acos());
    check_unary!(0.7, |x| x.atan());
    check_unary!(0.7, |x| x.sinh());
    check_unary!(0.7, |x| x.cosh());
    check_unary!(0.7, |x| x.tanh());
    check_unary!(0.7, |x| x.asinh());
    check_unary!(1.7, |x| x.acosh());
    check_unary!(0.4, |x| x.atanh());
    check_unary!(-0.7, |x| x.abs());
    check_unary!(0.7, |x| x.powi(3));
    check_unary!(0.7, |x| x.powi(-2));
    check_unary!(0.7, |x| x.to_degrees());
    check_unary!(0.7, |x| x.to_radians());
    check_unary!(2.3, |x| x.fract());
}

#[test]
fn mixed_scalar_operators() {
    check_unary!(0.7, |x| x + 2.0);
    check_unary!(0.7, |x| 2.0 + x);
    check_unary!(0.7, |x| x - 2.0);
    check_unary!(0.7, |x| 2.0 - x);
    check_unary!(0.7, |x| x * 3.0);
    check_unary!(0.7, |x| 3.0 * x);
    check_unary!(0.7, |x| x / 3.0);
    check_unary!(0.7, |x| 3.0 / x);
    check_unary!(5.3, |x| x % 2.0);
    check_unary!(0.7, |x| 5.0 % (x + 1.0));
}

#[test]
fn binary_operators() {
    check_binary!(0.7, 1.3, |a, b| a + b);
    check_binary!(0.7, 1.3, |a, b| a - b);
    check_binary!(0.7, 1.3, |a, b| a * b);
    check_binary!(0.7, 1.3, |a, b| a / b);
    check_binary!(7.5, 2.2, |a, b| a % b);
    check_binary!(0.7, 1.3, |a, b| a.powf(b));
    check_binary!(0.7, 1.3, |a, b| a.atan2(b));
    check_binary!(0.7, 1.3, |a, b| a.hypot(b));
    check_binary!(0.7, 1.3, |a, b| a.max(b) * b);
    check_binary!(0.7, 1.3, |a, b| a.min(b) * b);
    check_binary!(0.7, 1.3, |a, b| a.mul_add(b, a));
    check_binary!(0.7, 1.3, |a, b| a.log(b));
}

#[test]
fn compound_assignment() {
    let g = adtape::grad(
        |x: &[Active<f64>]| {
            let mut y = x[0];
            y *= x[1];
            y += x[0];
            y -= 2.0;
            y /= x[1];
            y
        },
        &[1.5, 2.5],
    );
    // y = (x0 x1 + x0 - 2) / x1
    assert_relative_eq!(g[0], 1.0 + 1.0 / 2.5, max_relative = 1e-12);
    assert_relative_eq!(g[1], (2.0 - 1.5) / (2.5 * 2.5), max_relative = 1e-12);
}

#[test]
fn deep_composition_matches_finite_differences() {
    check_binary!(0.3, 0.8, |a, b| ((a * b).sin() + (a / b).exp()).ln() * (a - b).tanh());
    check_binary!(0.3, 0.8, |a, b| (a.powi(2) + b.powi(2)).sqrt().cos() / (1.0 + a * a));
}

#[test]
fn piecewise_constant_functions_have_zero_gradient() {
    let g = adtape::grad(
        |x: &[Active<f64>]| x[0].floor() + x[0].ceil() + x[0].round() + x[0].trunc() + x[0].signum(),
        &[1.3],
    );
    assert_eq!(g[0], 0.0);
}

fn normal_pdf<T: Scalar>(x: T, mu: T, sigma: T) -> T {
    let two = T::from_f64(2.0).unwrap();
    let z = (x - mu) / sigma;
    (-(z * z) / two).exp() / (sigma * (two * T::PI()).sqrt())
}

#[test]
fn gaussian_density_gradient() {
    let (xp, mu, sigma) = (0.4, -0.3, 1.7);
    let pdf = normal_pdf(xp, mu, sigma);
    let analytic = -(xp - mu) / (sigma * sigma) * pdf;

    let g = adtape::grad(
        |v: &[Active<f64>]| normal_pdf(v[0], Active::constant(mu), Active::constant(sigma)),
        &[xp],
    );
    assert_relative_eq!(g[0], analytic, max_relative = 1e-12);

    let d = normal_pdf(Dual::variable(xp), Dual::constant(mu), Dual::constant(sigma));
    assert_relative_eq!(d.re, pdf, max_relative = 1e-12);
    assert_relative_eq!(d.eps, analytic, max_relative = 1e-12);
}

#[test]
fn f32_gradients() {
    let g = adtape::grad(|x: &[Active<f32>]| x[0].sin() * x[1], &[1.0_f32, 2.0]);
    assert_relative_eq!(g[0], 2.0 * 1.0_f32.cos(), max_relative = 1e-5);
    assert_relative_eq!(g[1], 1.0_f32.sin(), max_relative = 1e-5);
}

#[test]
fn powi_with_most_negative_exponent() {
    let expected = i32::MIN as f64;

    let g = adtape::grad(|x: &[Active<f64>]| x[0].powi(i32::MIN), &[1.0]);
    assert_eq!(g[0], expected);

    let g = adtape::grad(|x: &[Active<f64>]| x[0].expr().powi(i32::MIN).eval(), &[1.0]);
    assert_eq!(g[0], expected);

    let d = Dual::variable(1.0_f64).powi(i32::MIN);
    assert_eq!(d.re, 1.0);
    assert_eq!(d.eps, expected);
}
