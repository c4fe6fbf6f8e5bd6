//! Operation tape ("stack") for reverse- and forward-mode AD.
//!
//! Every elementary operation on an [`Active`] value appends one statement:
//! the gradient index of its result plus the `(index, multiplier)` pairs of
//! its operands, where each multiplier is the local partial derivative
//! evaluated at record time. Statements live in three parallel arrays
//! (statements, multipliers, operand indices), so the adjoint sweep is a
//! single multiply-accumulate loop with no per-operation dispatch.
//!
//! The same multiplier table drives both sweeps:
//! [`compute_adjoint`](Stack::compute_adjoint) walks statements in strict
//! reverse order, [`compute_tangent_linear`](Stack::compute_tangent_linear)
//! walks them forward.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::active::Active;
use crate::error::{AdError, Result};
use crate::Float;

/// Sentinel gradient index for passive values (not recorded on the tape).
pub const CONSTANT: u32 = u32::MAX;

/// A recorded statement: its result lives at `lhs_index`, and its operands'
/// multipliers/indices span `[prev.end_plus_one .. self.end_plus_one)`.
#[derive(Clone, Copy, Debug)]
struct Statement {
    lhs_index: u32,
    end_plus_one: u32,
}

/// How the operand storage of a [`Stack`] may grow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Growth {
    /// Amortized doubling; [`Stack::check_space`] only reserves.
    #[default]
    Automatic,
    /// Storage is pre-sized to [`StackConfig::initial_capacity`] operand
    /// slots and never grows; exceeding it is an error.
    Fixed,
}

/// Construction-time configuration of a [`Stack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackConfig {
    /// Number of operand slots (multiplier/index pairs) allocated up front.
    pub initial_capacity: usize,
    pub growth: Growth,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            initial_capacity: 1024,
            growth: Growth::Automatic,
        }
    }
}

impl StackConfig {
    /// A bounded configuration holding at most `capacity` operand slots.
    pub fn fixed(capacity: usize) -> Self {
        StackConfig {
            initial_capacity: capacity,
            growth: Growth::Fixed,
        }
    }
}

/// Operation tape plus gradient store.
///
/// Exactly one stack per thread is *current* at a time (see [`StackGuard`]);
/// arithmetic on [`Active`] values records onto it implicitly. The stack is
/// not `Sync` in spirit: record and sweep from a single thread.
pub struct Stack<F: Float> {
    statements: Vec<Statement>,
    multipliers: Vec<F>,
    indices: Vec<u32>,
    num_variables: u32,
    gradients: Vec<F>,
    independents: Vec<u32>,
    dependents: Vec<u32>,
    recording: bool,
    statement_open: bool,
    config: StackConfig,
}

impl<F: Float> Default for Stack<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> Stack<F> {
    /// Create an empty stack with the default (growable) configuration.
    pub fn new() -> Self {
        Self::with_config(StackConfig::default())
    }

    /// Create a growable stack with room for `est_ops` operand slots.
    pub fn with_capacity(est_ops: usize) -> Self {
        Self::with_config(StackConfig {
            initial_capacity: est_ops,
            growth: Growth::Automatic,
        })
    }

    /// Create a stack from an explicit configuration.
    pub fn with_config(config: StackConfig) -> Self {
        let cap = config.initial_capacity;
        let mut stack = Stack {
            statements: Vec::with_capacity(cap / 2 + 1),
            multipliers: Vec::with_capacity(cap),
            indices: Vec::with_capacity(cap),
            num_variables: 0,
            gradients: Vec::new(),
            independents: Vec::new(),
            dependents: Vec::new(),
            recording: true,
            statement_open: false,
            config,
        };
        // Sentinel statement at index 0 so that `statements[i-1].end_plus_one`
        // is always valid for i >= 1.
        stack.statements.push(Statement {
            lhs_index: CONSTANT,
            end_plus_one: 0,
        });
        stack
    }

    /// The configuration this stack was built with.
    pub fn config(&self) -> StackConfig {
        self.config
    }

    // ── Recording lifecycle ──

    /// Start a fresh trace.
    ///
    /// Clears all statements, the gradient store and the independent/dependent
    /// sets, and restarts gradient indices at zero. Any [`Active`] created
    /// before this call refers to the previous trace and must be re-created
    /// (or re-registered with [`register`](Self::register)).
    pub fn new_recording(&mut self) {
        log::debug!(
            "new recording: discarding {} statements, {} operations, {} gradient indices",
            self.n_statements(),
            self.n_operations(),
            self.num_variables
        );
        self.statements.truncate(1);
        self.multipliers.clear();
        self.indices.clear();
        self.num_variables = 0;
        self.gradients.clear();
        self.independents.clear();
        self.dependents.clear();
        self.statement_open = false;
        self.recording = true;
    }

    /// Stop appending statements; operators compute values only.
    pub fn pause_recording(&mut self) {
        self.recording = false;
        self.statement_open = false;
    }

    /// Resume appending statements after [`pause_recording`](Self::pause_recording).
    pub fn continue_recording(&mut self) {
        self.recording = true;
    }

    /// Whether statements are currently being appended.
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Allocate a fresh gradient index with no statement (an independent marker).
    #[inline]
    pub fn register_variable(&mut self) -> u32 {
        let idx = self.num_variables;
        self.num_variables += 1;
        idx
    }

    /// Create an active variable on this stack.
    pub fn variable(&mut self, value: F) -> Active<F> {
        let index = self.register_variable();
        Active::from_parts(value, index)
    }

    /// Give `x` a fresh gradient index in the current trace, keeping its value.
    pub fn register(&mut self, x: &mut Active<F>) {
        x.index = self.register_variable();
    }

    // ── Low-level statement construction ──

    /// Open a new statement for `output`, closing any open one.
    ///
    /// Fails with [`AdError::IndexOutOfRange`] if `output` was never
    /// allocated on this stack.
    pub fn push_lhs(&mut self, output: u32) -> Result<()> {
        if !self.recording {
            return Ok(());
        }
        self.check_index(output)?;
        self.statements.push(Statement {
            lhs_index: output,
            end_plus_one: self.multipliers.len() as u32,
        });
        self.statement_open = true;
        Ok(())
    }

    /// Append `(input, multiplier)` to the open statement.
    ///
    /// Passive inputs ([`CONSTANT`]) are ignored. Fails with
    /// [`AdError::NoOpenStatement`] if nothing is open, or with
    /// [`AdError::IndexOutOfRange`] if `input` was never allocated.
    pub fn push_rhs(&mut self, multiplier: F, input: u32) -> Result<()> {
        if !self.recording {
            return Ok(());
        }
        if !self.statement_open {
            return Err(AdError::NoOpenStatement);
        }
        if input == CONSTANT {
            return Ok(());
        }
        self.check_index(input)?;
        self.check_space(1)?;
        self.multipliers.push(multiplier);
        self.indices.push(input);
        let end = self.multipliers.len() as u32;
        if let Some(last) = self.statements.last_mut() {
            last.end_plus_one = end;
        }
        Ok(())
    }

    /// Reopen the most recent statement for further [`push_rhs`](Self::push_rhs) calls.
    ///
    /// Fails with [`AdError::WrongGradient`] if that statement's output is not
    /// `output`; the tape is left as it was.
    pub fn update_lhs(&mut self, output: u32) -> Result<()> {
        if !self.recording {
            return Ok(());
        }
        // Index 0 is the sentinel, never a real statement.
        let found = if self.statements.len() > 1 {
            self.statements[self.statements.len() - 1].lhs_index
        } else {
            CONSTANT
        };
        if found != output {
            return Err(AdError::WrongGradient {
                expected: output,
                found,
            });
        }
        self.statement_open = true;
        Ok(())
    }

    /// Close the open statement, if any.
    #[inline]
    pub fn close_statement(&mut self) {
        self.statement_open = false;
    }

    pub(crate) fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.num_variables {
            return Err(AdError::IndexOutOfRange {
                index: index as usize,
                len: self.num_variables as usize,
            });
        }
        Ok(())
    }

    /// Make sure `n` more operand slots can be appended.
    ///
    /// Reserves in the growable configuration; in the fixed configuration
    /// fails with [`AdError::CapacityExceeded`] instead of reallocating.
    pub fn check_space(&mut self, n: usize) -> Result<()> {
        match self.config.growth {
            Growth::Automatic => {
                self.multipliers.reserve(n);
                self.indices.reserve(n);
                Ok(())
            }
            Growth::Fixed => {
                let available = self
                    .config
                    .initial_capacity
                    .saturating_sub(self.multipliers.len());
                if n > available {
                    Err(AdError::CapacityExceeded {
                        requested: n,
                        available,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Record one statement with the given operands and return its new
    /// gradient index.
    ///
    /// Passive operands are dropped. If every operand is passive, or the
    /// stack is paused, nothing is recorded and [`CONSTANT`] is returned.
    ///
    /// # Panics
    ///
    /// Panics if a fixed-capacity stack is full: operators have no way to
    /// report the failure, so it is treated as a fatal allocation error.
    pub(crate) fn record_statement(&mut self, operands: &[(u32, F)]) -> u32 {
        if !self.recording || operands.iter().all(|&(idx, _)| idx == CONSTANT) {
            return CONSTANT;
        }
        if let Err(err) = self.check_space(operands.len()) {
            panic!("{err}");
        }
        let lhs = self.register_variable();
        for &(idx, mult) in operands {
            if idx != CONSTANT {
                self.multipliers.push(mult);
                self.indices.push(idx);
            }
        }
        self.statements.push(Statement {
            lhs_index: lhs,
            end_plus_one: self.multipliers.len() as u32,
        });
        self.statement_open = false;
        lhs
    }

    /// Record a statement with no operands for a fresh index: the result is
    /// active but depends on nothing recorded (e.g. a passive assignment
    /// into an active array element).
    pub(crate) fn record_passive_assignment(&mut self) -> u32 {
        let lhs = self.register_variable();
        if self.recording {
            self.statements.push(Statement {
                lhs_index: lhs,
                end_plus_one: self.multipliers.len() as u32,
            });
            self.statement_open = false;
        }
        lhs
    }

    /// Record a unary operation: `result = f(operand)` with `multiplier = df/d(operand)`.
    #[inline]
    pub fn push_unary(&mut self, operand: u32, multiplier: F) -> u32 {
        self.record_statement(&[(operand, multiplier)])
    }

    /// Record a binary operation with precomputed partial derivatives.
    #[inline]
    pub fn push_binary(&mut self, lhs: u32, lhs_mult: F, rhs: u32, rhs_mult: F) -> u32 {
        self.record_statement(&[(lhs, lhs_mult), (rhs, rhs_mult)])
    }

    // ── Sweeps ──

    fn ensure_gradient_space(&mut self) {
        let n = self.num_variables as usize;
        if self.gradients.len() < n {
            self.gradients.resize(n, F::zero());
        }
    }

    /// Reverse (adjoint) sweep over the whole tape.
    ///
    /// Seed output adjoints with [`set_gradient`](Self::set_gradient) first.
    /// Each statement's adjoint is propagated to its operands and then
    /// consumed (reset to zero), so a second call without reseeding adds
    /// nothing; call [`clear_gradients`](Self::clear_gradients) before
    /// reseeding to reproduce a result.
    pub fn compute_adjoint(&mut self) {
        self.ensure_gradient_space();
        log::debug!(
            "adjoint sweep: {} statements, {} operations",
            self.n_statements(),
            self.n_operations()
        );
        let n = self.gradients.len();
        let grads = &mut self.gradients;
        for i in (1..self.statements.len()).rev() {
            let stmt = self.statements[i];
            let lhs = stmt.lhs_index as usize;
            assert!(
                lhs < n,
                "corrupt tape: statement {i} writes gradient index {lhs} beyond {n}"
            );
            let a = grads[lhs];
            if a == F::zero() {
                continue;
            }
            grads[lhs] = F::zero();
            let start = self.statements[i - 1].end_plus_one as usize;
            let end = stmt.end_plus_one as usize;
            for j in start..end {
                let idx = self.indices[j] as usize;
                assert!(
                    idx < n,
                    "corrupt tape: statement {i} reads gradient index {idx} beyond {n}"
                );
                grads[idx] = grads[idx] + self.multipliers[j] * a;
            }
        }
    }

    /// Forward (tangent-linear) sweep over the whole tape.
    ///
    /// Seed input tangents with [`set_gradient`](Self::set_gradient); every
    /// statement output is overwritten with `Σ multiplier · tangent[input]`.
    pub fn compute_tangent_linear(&mut self) {
        self.ensure_gradient_space();
        log::debug!(
            "tangent-linear sweep: {} statements, {} operations",
            self.n_statements(),
            self.n_operations()
        );
        let n = self.gradients.len();
        let grads = &mut self.gradients;
        for i in 1..self.statements.len() {
            let stmt = self.statements[i];
            let lhs = stmt.lhs_index as usize;
            assert!(
                lhs < n,
                "corrupt tape: statement {i} writes gradient index {lhs} beyond {n}"
            );
            let start = self.statements[i - 1].end_plus_one as usize;
            let end = stmt.end_plus_one as usize;
            let mut sum = F::zero();
            for j in start..end {
                let idx = self.indices[j] as usize;
                assert!(
                    idx < n,
                    "corrupt tape: statement {i} reads gradient index {idx} beyond {n}"
                );
                sum = sum + self.multipliers[j] * grads[idx];
            }
            grads[lhs] = sum;
        }
    }

    // ── Gradient store ──

    /// Seed one gradient slot. Passive indices are ignored.
    pub fn set_gradient(&mut self, index: u32, gradient: F) {
        if index == CONSTANT {
            return;
        }
        self.ensure_gradient_space();
        let i = index as usize;
        if i >= self.gradients.len() {
            self.gradients.resize(i + 1, F::zero());
        }
        self.gradients[i] = gradient;
    }

    /// Read one gradient slot. Slots never touched by a sweep read as zero.
    pub fn get_gradient(&self, index: u32) -> F {
        self.gradients
            .get(index as usize)
            .copied()
            .unwrap_or_else(F::zero)
    }

    /// Seed the contiguous range `first .. first + values.len()`.
    pub fn set_gradients(&mut self, first: u32, values: &[F]) -> Result<()> {
        let end = first as usize + values.len();
        if end > self.num_variables as usize {
            return Err(AdError::IndexOutOfRange {
                index: end - 1,
                len: self.num_variables as usize,
            });
        }
        self.ensure_gradient_space();
        self.gradients[first as usize..end].copy_from_slice(values);
        Ok(())
    }

    /// Extract the contiguous range `first .. first + out.len()`.
    pub fn get_gradients(&self, first: u32, out: &mut [F]) -> Result<()> {
        let end = first as usize + out.len();
        if end > self.num_variables as usize {
            return Err(AdError::IndexOutOfRange {
                index: end - 1,
                len: self.num_variables as usize,
            });
        }
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.get_gradient(first + k as u32);
        }
        Ok(())
    }

    /// Zero the whole gradient store.
    pub fn clear_gradients(&mut self) {
        self.gradients.iter_mut().for_each(|g| *g = F::zero());
    }

    // ── Independent / dependent boundary ──

    /// Mark values as independent (Jacobian columns). Passive values are skipped.
    pub fn independent(&mut self, xs: &[Active<F>]) {
        self.independents
            .extend(xs.iter().map(|x| x.index).filter(|&i| i != CONSTANT));
    }

    /// Mark values as dependent (Jacobian rows). Passive values are skipped.
    pub fn dependent(&mut self, ys: &[Active<F>]) {
        self.dependents
            .extend(ys.iter().map(|y| y.index).filter(|&i| i != CONSTANT));
    }

    /// Mark gradient indices as independent.
    pub fn independent_indices(&mut self, indices: &[u32]) {
        self.independents
            .extend(indices.iter().copied().filter(|&i| i != CONSTANT));
    }

    /// Mark gradient indices as dependent.
    pub fn dependent_indices(&mut self, indices: &[u32]) {
        self.dependents
            .extend(indices.iter().copied().filter(|&i| i != CONSTANT));
    }

    pub fn clear_independents(&mut self) {
        self.independents.clear();
    }

    pub fn clear_dependents(&mut self) {
        self.dependents.clear();
    }

    pub fn n_independents(&self) -> usize {
        self.independents.len()
    }

    pub fn n_dependents(&self) -> usize {
        self.dependents.len()
    }

    /// Jacobian of the dependents with respect to the independents,
    /// row-major `n_dependents × n_independents`.
    ///
    /// Uses forward mode when there are no more independents than
    /// dependents, reverse mode otherwise. The gradient store is cleared
    /// on return.
    pub fn jacobian(&mut self) -> Vec<F> {
        if self.independents.len() <= self.dependents.len() {
            log::debug!(
                "jacobian: forward mode ({} independents <= {} dependents)",
                self.independents.len(),
                self.dependents.len()
            );
            self.jacobian_forward()
        } else {
            log::debug!(
                "jacobian: reverse mode ({} independents > {} dependents)",
                self.independents.len(),
                self.dependents.len()
            );
            self.jacobian_reverse()
        }
    }

    /// Jacobian via one tangent-linear sweep per independent.
    pub fn jacobian_forward(&mut self) -> Vec<F> {
        let m = self.dependents.len();
        let n = self.independents.len();
        let mut jac = vec![F::zero(); m * n];
        self.ensure_gradient_space();
        for col in 0..n {
            self.clear_gradients();
            let seed = self.independents[col];
            self.set_gradient(seed, F::one());
            self.compute_tangent_linear();
            for (row, &dep) in self.dependents.iter().enumerate() {
                jac[row * n + col] = self.get_gradient(dep);
            }
        }
        self.clear_gradients();
        jac
    }

    /// Jacobian via one adjoint sweep per dependent.
    pub fn jacobian_reverse(&mut self) -> Vec<F> {
        let m = self.dependents.len();
        let n = self.independents.len();
        let mut jac = vec![F::zero(); m * n];
        self.ensure_gradient_space();
        for row in 0..m {
            self.clear_gradients();
            let seed = self.dependents[row];
            self.set_gradient(seed, F::one());
            self.compute_adjoint();
            for (col, &ind) in self.independents.iter().enumerate() {
                jac[row * n + col] = self.get_gradient(ind);
            }
        }
        self.clear_gradients();
        jac
    }

    // ── Introspection ──

    /// Number of recorded statements (tape entries).
    #[inline]
    pub fn n_statements(&self) -> usize {
        self.statements.len() - 1
    }

    /// Number of recorded operand slots across all statements.
    #[inline]
    pub fn n_operations(&self) -> usize {
        self.multipliers.len()
    }

    /// Number of gradient indices allocated in the current trace.
    #[inline]
    pub fn max_gradient_index(&self) -> u32 {
        self.num_variables
    }

    /// Output gradient index of every statement, in recording order.
    pub fn statement_outputs(&self) -> impl Iterator<Item = u32> + '_ {
        self.statements[1..].iter().map(|s| s.lhs_index)
    }

    /// Approximate heap usage in bytes.
    pub fn memory(&self) -> usize {
        self.statements.capacity() * std::mem::size_of::<Statement>()
            + self.multipliers.capacity() * std::mem::size_of::<F>()
            + self.indices.capacity() * std::mem::size_of::<u32>()
            + self.gradients.capacity() * std::mem::size_of::<F>()
    }
}

impl<F: Float> fmt::Display for Stack<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Stack: {} statements, {} operations, {} gradient indices",
            self.n_statements(),
            self.n_operations(),
            self.num_variables
        )?;
        writeln!(
            f,
            "  recording: {}, growth: {:?}, {} independents, {} dependents",
            if self.recording { "on" } else { "paused" },
            self.config.growth,
            self.independents.len(),
            self.dependents.len()
        )?;
        write!(f, "  memory: {} bytes", self.memory())
    }
}

// Thread-local current stack pointer.
thread_local! {
    static STACK_F32: Cell<*mut Stack<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static STACK_F64: Cell<*mut Stack<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Selects the thread-local current-stack slot for a given float type.
pub trait StackThreadLocal: Float {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Stack<Self>>>;
}

impl StackThreadLocal for f32 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Stack<Self>>> {
        &STACK_F32
    }
}

impl StackThreadLocal for f64 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Stack<Self>>> {
        &STACK_F64
    }
}

/// Access the current stack of this thread. Panics if none is active.
#[inline]
pub fn with_active_stack<F: StackThreadLocal, R>(f: impl FnOnce(&mut Stack<F>) -> R) -> R {
    F::cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "No active stack. Activate one with StackGuard::new or use adtape::grad()."
        );
        // SAFETY: a non-null slot was set by a live StackGuard, which holds
        // the stack's mutable borrow; the thread-local slot confines access
        // to this thread and the closure is the only borrow made here.
        let stack = unsafe { &mut *ptr };
        f(stack)
    })
}

/// Whether a stack for `F` is current on this thread.
pub fn is_stack_active<F: StackThreadLocal>() -> bool {
    F::cell().with(|cell| !cell.get().is_null())
}

/// RAII guard making a stack current for this thread and restoring the
/// previous one on drop.
///
/// The guard holds the stack's mutable borrow for its whole lifetime, so
/// the stack can be neither moved nor dropped while it is current. Reach
/// the stack through the guard instead:
///
/// ```
/// use adtape::{Active, Stack, StackGuard};
///
/// let mut stack = Stack::<f64>::new();
/// let mut guard = StackGuard::new(&mut stack);
/// let x = Active::new(3.0);
/// let y = x * x;
/// guard.set_gradient(y.gradient_index(), 1.0);
/// guard.compute_adjoint();
/// assert_eq!(guard.get_gradient(x.gradient_index()), 6.0);
/// ```
///
/// Moving the stack while it is current does not compile:
///
/// ```compile_fail
/// use adtape::{Active, Stack, StackGuard};
///
/// let mut stack = Stack::<f64>::new();
/// let guard = StackGuard::new(&mut stack);
/// let moved = stack;
/// let _y = Active::new(1.0) * 2.0;
/// drop(guard);
/// ```
pub struct StackGuard<'a, F: StackThreadLocal> {
    stack: *mut Stack<F>,
    prev: *mut Stack<F>,
    _borrow: PhantomData<&'a mut Stack<F>>,
}

impl<'a, F: StackThreadLocal> StackGuard<'a, F> {
    /// Make `stack` current until the guard is dropped.
    pub fn new(stack: &'a mut Stack<F>) -> Self {
        let ptr: *mut Stack<F> = stack;
        let prev = F::cell().with(|cell| cell.replace(ptr));
        StackGuard {
            stack: ptr,
            prev,
            _borrow: PhantomData,
        }
    }
}

impl<'a, F: StackThreadLocal> Deref for StackGuard<'a, F> {
    type Target = Stack<F>;

    fn deref(&self) -> &Stack<F> {
        // SAFETY: the pointer comes from the `&'a mut` borrow this guard
        // holds; operators reach the same stack only through this pointer.
        unsafe { &*self.stack }
    }
}

impl<'a, F: StackThreadLocal> DerefMut for StackGuard<'a, F> {
    fn deref_mut(&mut self) -> &mut Stack<F> {
        // SAFETY: see `deref`.
        unsafe { &mut *self.stack }
    }
}

impl<'a, F: StackThreadLocal> Drop for StackGuard<'a, F> {
    fn drop(&mut self) {
        F::cell().with(|cell| {
            cell.set(self.prev);
        });
    }
}
