//! Active arrays and references into their elements.
//!
//! Indexing an [`ActiveArray`] does not copy: [`ActiveRef`] and
//! [`ActiveRefMut`] are `(array, offset)` pairs that read the element's
//! existing value and gradient index in place. Their lifetime is tied to
//! the array borrow, so a reference can never outlive its storage.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::active::{bridge, Active};
use crate::error::{AdError, Result};
use crate::expr::{ArrayId, Expr, LiveArray};
use crate::stack::{self, StackThreadLocal, CONSTANT};
use crate::{Float, Stack};

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> ArrayId {
    NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed)
}

/// A fixed-length array of active values stored as parallel value and
/// gradient-index vectors.
#[derive(Debug)]
pub struct ActiveArray<F: Float> {
    id: ArrayId,
    values: Vec<F>,
    indices: Vec<u32>,
}

impl<F: Float> Clone for ActiveArray<F> {
    // A clone is a distinct storage and gets its own identity.
    fn clone(&self) -> Self {
        ActiveArray {
            id: next_id(),
            values: self.values.clone(),
            indices: self.indices.clone(),
        }
    }
}

impl<F: Float> ActiveArray<F> {
    /// Passive array: every element is a constant.
    pub fn constant(values: &[F]) -> Self {
        ActiveArray {
            id: next_id(),
            values: values.to_vec(),
            indices: vec![CONSTANT; values.len()],
        }
    }

    /// Array holding copies of existing active values (indices are shared).
    pub fn from_actives(xs: &[Active<F>]) -> Self {
        ActiveArray {
            id: next_id(),
            values: xs.iter().map(|x| x.value).collect(),
            indices: xs.iter().map(|x| x.index).collect(),
        }
    }

    /// Identity used by [`Expr::is_aliased`].
    #[inline]
    pub fn id(&self) -> ArrayId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn value(&self, i: usize) -> F {
        self.values[i]
    }

    pub fn values(&self) -> &[F] {
        &self.values
    }

    pub fn gradient_indices(&self) -> &[u32] {
        &self.indices
    }

    /// Copy out the elements as standalone active values.
    pub fn to_actives(&self) -> Vec<Active<F>> {
        self.values
            .iter()
            .zip(&self.indices)
            .map(|(&v, &i)| Active::from_parts(v, i))
            .collect()
    }

    /// Reference to element `i`, or `None` if out of bounds.
    pub fn get(&self, i: usize) -> Option<ActiveRef<'_, F>> {
        (i < self.len()).then_some(ActiveRef {
            array: self,
            offset: i,
        })
    }

    /// Reference to element `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    pub fn at(&self, i: usize) -> ActiveRef<'_, F> {
        assert!(
            i < self.len(),
            "index {i} out of bounds for active array of length {}",
            self.len()
        );
        ActiveRef {
            array: self,
            offset: i,
        }
    }

    /// Assignable reference to element `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    pub fn at_mut(&mut self, i: usize) -> ActiveRefMut<'_, F> {
        assert!(
            i < self.len(),
            "index {i} out of bounds for active array of length {}",
            self.len()
        );
        ActiveRefMut {
            array: self,
            offset: i,
        }
    }

    fn live(&self) -> LiveArray<'_, F> {
        LiveArray {
            id: self.id,
            values: &self.values,
            indices: &self.indices,
        }
    }
}

impl<F: StackThreadLocal> ActiveArray<F> {
    /// Array of fresh independent variables on the current stack.
    pub fn new(values: &[F]) -> Self {
        let indices = stack::with_active_stack(|s: &mut Stack<F>| {
            values.iter().map(|_| s.register_variable()).collect()
        });
        ActiveArray {
            id: next_id(),
            values: values.to_vec(),
            indices,
        }
    }

    /// Gradient-store entries for every element (zero for passive elements).
    pub fn get_gradients(&self) -> Vec<F> {
        stack::with_active_stack(|s: &mut Stack<F>| {
            self.indices.iter().map(|&i| s.get_gradient(i)).collect()
        })
    }

    /// Seed the gradient store for every element.
    pub fn set_gradients(&self, gradients: &[F]) -> Result<()> {
        if gradients.len() != self.len() {
            return Err(AdError::DimensionMismatch {
                what: "active array gradients",
                expected: self.len(),
                found: gradients.len(),
            });
        }
        stack::with_active_stack(|s: &mut Stack<F>| {
            for (&i, &g) in self.indices.iter().zip(gradients) {
                s.set_gradient(i, g);
            }
        });
        Ok(())
    }

    /// Elementwise assignment `self[i] = exprs[i]`, one statement per element.
    ///
    /// Leaves read from this array see its contents as they were before the
    /// assignment. When no expression reads an element that an earlier
    /// position already overwrote, elements are written as they are
    /// evaluated; otherwise every right-hand side is evaluated into a
    /// temporary first.
    pub fn assign(&mut self, exprs: &[Expr<F>]) -> Result<()> {
        if exprs.len() != self.len() {
            return Err(AdError::DimensionMismatch {
                what: "active array assignment",
                expected: self.len(),
                found: exprs.len(),
            });
        }
        let aliased = exprs
            .iter()
            .enumerate()
            .any(|(i, e)| e.is_aliased(self.id, 0..i));

        if aliased {
            log::debug!(
                "array {} assignment reads overwritten elements; evaluating into a temporary",
                self.id
            );
            let live = self.live();
            let linear: Vec<_> = exprs.iter().map(|e| e.linearize(Some(&live))).collect();
            for (i, (value, operands)) in linear.into_iter().enumerate() {
                self.store(i, value, &operands);
            }
        } else {
            for (i, e) in exprs.iter().enumerate() {
                let (value, operands) = e.linearize(Some(&self.live()));
                self.store(i, value, &operands);
            }
        }
        Ok(())
    }

    /// Write `value` into element `i`, recording its dependence on `operands`.
    ///
    /// The element gets a fresh gradient index even for passive values, so
    /// indices seen by earlier statements are never rebound. A paused stack
    /// keeps the old index.
    fn store(&mut self, i: usize, value: F, operands: &[(u32, F)]) {
        let old = self.indices[i];
        let index = stack::with_active_stack(|s: &mut Stack<F>| {
            if !s.is_recording() {
                old
            } else if operands.is_empty() {
                s.record_passive_assignment()
            } else {
                s.record_statement(operands)
            }
        });
        self.values[i] = value;
        self.indices[i] = index;
    }
}

/// Read-only reference to one element of an [`ActiveArray`].
#[derive(Clone, Copy, Debug)]
pub struct ActiveRef<'a, F: Float> {
    array: &'a ActiveArray<F>,
    offset: usize,
}

impl<'a, F: Float> ActiveRef<'a, F> {
    #[inline]
    pub fn value(&self) -> F {
        self.array.values[self.offset]
    }

    /// The element's existing gradient index; no allocation happens.
    #[inline]
    pub fn gradient_index(&self) -> u32 {
        self.array.indices[self.offset]
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Copy of the element sharing its gradient index.
    #[inline]
    pub fn to_active(&self) -> Active<F> {
        Active::from_parts(self.value(), self.gradient_index())
    }

    /// Leaf expression remembering where it was read from.
    #[inline]
    pub fn expr(&self) -> Expr<F> {
        Expr::array_leaf(self.value(), self.gradient_index(), self.array.id, self.offset)
    }

    /// Whether this reference points into `range` of its array.
    pub fn is_aliased(&self, range: Range<usize>) -> bool {
        range.contains(&self.offset)
    }
}

impl<'a, F: StackThreadLocal> ActiveRef<'a, F> {
    pub fn get_gradient(&self) -> F {
        self.to_active().get_gradient()
    }

    pub fn set_gradient(&self, gradient: F) {
        self.to_active().set_gradient(gradient)
    }
}

impl<'a, F: Float> From<ActiveRef<'a, F>> for Expr<F> {
    fn from(r: ActiveRef<'a, F>) -> Self {
        r.expr()
    }
}

/// Assignable reference to one element of an [`ActiveArray`].
#[derive(Debug)]
pub struct ActiveRefMut<'a, F: Float> {
    array: &'a mut ActiveArray<F>,
    offset: usize,
}

impl<'a, F: Float> ActiveRefMut<'a, F> {
    #[inline]
    pub fn value(&self) -> F {
        self.array.values[self.offset]
    }

    #[inline]
    pub fn gradient_index(&self) -> u32 {
        self.array.indices[self.offset]
    }

    #[inline]
    pub fn to_active(&self) -> Active<F> {
        Active::from_parts(self.value(), self.gradient_index())
    }

    #[inline]
    pub fn expr(&self) -> Expr<F> {
        Expr::array_leaf(self.value(), self.gradient_index(), self.array.id, self.offset)
    }
}

impl<'a, F: StackThreadLocal> ActiveRefMut<'a, F> {
    /// Store a passive value. The element stays active under a fresh index
    /// that depends on nothing recorded.
    pub fn set_value(&mut self, value: F) {
        self.array.store(self.offset, value, &[]);
    }

    /// Store a copy of `x`, recorded as `element = 1·x`.
    pub fn assign_active(&mut self, x: Active<F>) {
        let operands: &[(u32, F)] = if x.is_constant() {
            &[]
        } else {
            &[(x.index, F::one())]
        };
        self.array.store(self.offset, x.value, operands);
    }

    /// Evaluate `e` as one statement and store the result. Leaves read from
    /// this array see its current contents.
    pub fn assign(&mut self, e: &Expr<F>) {
        let (value, operands) = e.linearize(Some(&self.array.live()));
        self.array.store(self.offset, value, &operands);
    }

    pub fn get_gradient(&self) -> F {
        self.to_active().get_gradient()
    }

    pub fn set_gradient(&self, gradient: F) {
        self.to_active().set_gradient(gradient)
    }

    /// See [`Active::add_derivative_dependence`].
    pub fn add_derivative_dependence(&self, rhs: &[Active<F>], multipliers: &[F]) -> Result<()> {
        let indices: Vec<u32> = rhs.iter().map(|x| x.index).collect();
        bridge::add_dependence::<F>(self.gradient_index(), &indices, multipliers, 1)
    }

    /// See [`Active::append_derivative_dependence`].
    pub fn append_derivative_dependence(
        &self,
        rhs: &[Active<F>],
        multipliers: &[F],
    ) -> Result<()> {
        let indices: Vec<u32> = rhs.iter().map(|x| x.index).collect();
        bridge::append_dependence::<F>(self.gradient_index(), &indices, multipliers, 1)
    }
}
