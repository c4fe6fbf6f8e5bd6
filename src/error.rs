//! Error type for recoverable misuse of the tape.
//!
//! Only caller mistakes are reported here. Internal inconsistencies of the
//! engine itself abort with a panic instead of producing wrong derivatives.

use thiserror::Error;

/// Errors surfaced by [`Stack`](crate::Stack) and the types recording on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdError {
    /// A derivative contribution was appended to an entry whose output
    /// index differs from the one supplied. The tape is left untouched.
    #[error(
        "wrong gradient: entry for gradient index {found} is the most recent statement, \
         but gradient index {expected} was supplied"
    )]
    WrongGradient { expected: u32, found: u32 },

    /// `push_rhs` was called while no statement was open.
    #[error("no open statement: call push_lhs or update_lhs before push_rhs")]
    NoOpenStatement,

    /// A bounded stack cannot hold the requested number of operations.
    #[error("stack capacity exceeded: {requested} more operations requested, {available} available")]
    CapacityExceeded { requested: usize, available: usize },

    /// A slice argument does not have the required length.
    #[error("dimension mismatch in {what}: expected {expected}, got {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A derivative dependence was declared on a passive value, which has
    /// no gradient index to attach a statement to.
    #[error("derivative dependence declared on a passive value")]
    PassiveOutput,

    /// A gradient index lies outside the allocated index space.
    #[error("gradient index {index} out of range (allocated {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdError>;
