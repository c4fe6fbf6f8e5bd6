use std::cell::Cell;
use std::marker::PhantomData;

use crate::float::Float;

use super::ActiveFunction;

thread_local! {
    static FUNC_F32: Cell<*mut ActiveFunction<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static FUNC_F64: Cell<*mut ActiveFunction<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Selects the thread-local recording slot for a float type.
pub trait FunctionThreadLocal: Float {
    fn function_cell() -> &'static std::thread::LocalKey<Cell<*mut ActiveFunction<Self>>>;
}

impl FunctionThreadLocal for f32 {
    fn function_cell() -> &'static std::thread::LocalKey<Cell<*mut ActiveFunction<Self>>> {
        &FUNC_F32
    }
}

impl FunctionThreadLocal for f64 {
    fn function_cell() -> &'static std::thread::LocalKey<Cell<*mut ActiveFunction<Self>>> {
        &FUNC_F64
    }
}

/// Run `f` on the function currently being recorded on this thread.
///
/// # Panics
///
/// Panics if no recording is in progress.
#[inline]
pub fn with_active_function<F: FunctionThreadLocal, R>(
    f: impl FnOnce(&mut ActiveFunction<F>) -> R,
) -> R {
    F::function_cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "No active function. Use adtape::record() to record a function."
        );
        // SAFETY: FunctionGuard keeps the pointer valid while it is installed,
        // and the slot is thread-local.
        let func = unsafe { &mut *ptr };
        f(func)
    })
}

/// RAII guard installing a function as this thread's recording target.
///
/// Holds the function's mutable borrow, so it cannot be moved or read
/// while recording is in progress.
pub struct FunctionGuard<'a, F: FunctionThreadLocal> {
    prev: *mut ActiveFunction<F>,
    _borrow: PhantomData<&'a mut ActiveFunction<F>>,
}

impl<'a, F: FunctionThreadLocal> FunctionGuard<'a, F> {
    /// Record onto `func` until the guard drops.
    pub fn new(func: &'a mut ActiveFunction<F>) -> Self {
        let ptr: *mut ActiveFunction<F> = func;
        let prev = F::function_cell().with(|cell| cell.replace(ptr));
        FunctionGuard {
            prev,
            _borrow: PhantomData,
        }
    }
}

impl<'a, F: FunctionThreadLocal> Drop for FunctionGuard<'a, F> {
    fn drop(&mut self) {
        F::function_cell().with(|cell| cell.set(self.prev));
    }
}
