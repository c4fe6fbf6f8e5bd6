use adtape::{Active, ActiveArray, AdError, Expr, Stack, StackGuard};
use approx::assert_relative_eq;

#[test]
fn element_reference_shares_index() {
    let mut stack = Stack::<f64>::new();
    let guard = StackGuard::new(&mut stack);

    let arr = ActiveArray::new(&[1.0, 2.0, 3.0]);
    let allocated = guard.max_gradient_index();

    let r = arr.at(1);
    assert_eq!(r.value(), 2.0);
    assert_eq!(r.offset(), 1);
    assert_eq!(r.gradient_index(), arr.gradient_indices()[1]);
    assert_eq!(r.to_active().gradient_index(), r.gradient_index());
    assert_eq!(guard.max_gradient_index(), allocated);
    assert!(arr.get(3).is_none());
    assert!(r.is_aliased(0..2));
    assert!(!r.is_aliased(2..3));
}

#[test]
fn gradients_flow_through_references() {
    let mut stack = Stack::<f64>::new();
    let mut guard = StackGuard::new(&mut stack);

    let arr = ActiveArray::new(&[1.5, -2.0]);
    let y = (arr.at(0).expr() * arr.at(1).expr() + arr.at(1).expr().exp()).eval();
    assert_eq!(guard.n_statements(), 1);

    y.set_gradient(1.0);
    guard.compute_adjoint();
    let g = arr.get_gradients();
    assert_relative_eq!(g[0], -2.0);
    assert_relative_eq!(g[1], 1.5 + (-2.0_f64).exp(), max_relative = 1e-14);
    assert_relative_eq!(arr.at(0).get_gradient(), -2.0);
}

#[test]
fn rotation_reads_values_from_before_the_assignment() {
    let mut stack = Stack::<f64>::new();
    let mut guard = StackGuard::new(&mut stack);

    let mut arr = ActiveArray::new(&[1.0, 2.0, 3.0]);
    let original = arr.to_actives();

    // Position 2 reads position 0, which an earlier position already wrote.
    let exprs: Vec<Expr<f64>> = vec![arr.at(1).expr() * 10.0, arr.at(2).expr() * 10.0, arr.at(0).expr() * 10.0];
    assert!(exprs[2].is_aliased(arr.id(), 0..2));
    arr.assign(&exprs).unwrap();
    assert_eq!(arr.values(), &[20.0, 30.0, 10.0]);

    arr.set_gradients(&[1.0, 2.0, 3.0]).unwrap();
    guard.compute_adjoint();
    assert_relative_eq!(original[0].get_gradient(), 30.0);
    assert_relative_eq!(original[1].get_gradient(), 10.0);
    assert_relative_eq!(original[2].get_gradient(), 20.0);
}

#[test]
fn non_aliased_assignment_writes_in_place() {
    let mut stack = Stack::<f64>::new();
    let mut guard = StackGuard::new(&mut stack);

    let mut arr = ActiveArray::new(&[1.0, 2.0]);
    let original = arr.to_actives();
    let exprs = vec![arr.at(1).expr() * 2.0, arr.at(1).expr() + arr.at(1).expr()];
    assert!(!exprs[1].is_aliased(arr.id(), 0..1));
    arr.assign(&exprs).unwrap();
    assert_eq!(arr.values(), &[4.0, 4.0]);
    assert_eq!(guard.n_statements(), 2);

    // Fresh indices: the originals are untouched by the assignment.
    assert_ne!(arr.gradient_indices()[0], original[0].gradient_index());

    arr.set_gradients(&[1.0, 1.0]).unwrap();
    guard.compute_adjoint();
    assert_eq!(original[0].get_gradient(), 0.0);
    assert_relative_eq!(original[1].get_gradient(), 4.0);
}

#[test]
fn assignment_length_is_checked() {
    let mut stack = Stack::<f64>::new();
    let _guard = StackGuard::new(&mut stack);

    let mut arr = ActiveArray::new(&[1.0, 2.0]);
    let err = arr.assign(&[Expr::constant(1.0)]).unwrap_err();
    assert_eq!(
        err,
        AdError::DimensionMismatch {
            what: "active array assignment",
            expected: 2,
            found: 1,
        }
    );
    assert!(arr.set_gradients(&[1.0]).is_err());
}

#[test]
fn mutable_reference_assignment() {
    let mut stack = Stack::<f64>::new();
    let mut guard = StackGuard::new(&mut stack);

    let x = Active::new(3.0);
    let mut arr = ActiveArray::new(&[1.0, 2.0]);
    let first = arr.at(0).to_active();

    // Reads the element being overwritten.
    let e = arr.at(0).expr() * arr.at(1).expr();
    arr.at_mut(0).assign(&e);
    assert_eq!(arr.value(0), 2.0);

    arr.at_mut(1).assign_active(x);
    assert_eq!(arr.value(1), 3.0);
    assert_ne!(arr.at(1).gradient_index(), x.gradient_index());

    arr.set_gradients(&[1.0, 1.0]).unwrap();
    guard.compute_adjoint();
    assert_relative_eq!(first.get_gradient(), 2.0);
    assert_relative_eq!(x.get_gradient(), 1.0);
}

#[test]
fn passive_store_keeps_element_active() {
    let mut stack = Stack::<f64>::new();
    let mut guard = StackGuard::new(&mut stack);

    let mut arr = ActiveArray::new(&[1.0, 2.0]);
    let before = arr.at(0).gradient_index();
    arr.at_mut(0).set_value(7.0);
    let r = arr.at(0);
    assert_eq!(r.value(), 7.0);
    assert_ne!(r.gradient_index(), before);
    assert!(!r.to_active().is_constant());

    // The new element depends on nothing recorded.
    let y = (arr.at(0).expr() * arr.at(1).expr()).eval();
    y.set_gradient(1.0);
    guard.compute_adjoint();
    assert_relative_eq!(arr.at(1).get_gradient(), 7.0);
    assert_eq!(guard.get_gradient(before), 0.0);
}

#[test]
fn paused_stack_keeps_element_index() {
    let mut stack = Stack::<f64>::new();
    let mut guard = StackGuard::new(&mut stack);

    let mut arr = ActiveArray::new(&[1.0]);
    let index = arr.at(0).gradient_index();
    guard.pause_recording();
    let scaled = [arr.at(0).expr() * 4.0];
    arr.assign(&scaled).unwrap();
    guard.continue_recording();
    assert_eq!(arr.value(0), 4.0);
    assert_eq!(arr.at(0).gradient_index(), index);
    assert_eq!(guard.n_statements(), 0);
}

#[test]
fn constant_arrays_are_passive() {
    let arr = ActiveArray::constant(&[1.0_f64, 2.0]);
    assert_eq!(arr.len(), 2);
    assert!(arr.to_actives().iter().all(|a| a.is_constant()));
    let copy = arr.clone();
    assert_ne!(copy.id(), arr.id());
}

#[test]
fn references_into_other_arrays_are_not_aliased() {
    let mut stack = Stack::<f64>::new();
    let _guard = StackGuard::new(&mut stack);

    let mut a = ActiveArray::new(&[1.0, 2.0]);
    let b = ActiveArray::new(&[10.0, 20.0]);
    let exprs = vec![b.at(1).expr() + 0.0, b.at(0).expr() + a.at(1).expr()];
    assert!(!exprs[1].is_aliased(a.id(), 0..1));
    assert!(exprs[1].references(b.id()));
    a.assign(&exprs).unwrap();
    assert_eq!(a.values(), &[20.0, 12.0]);
}
