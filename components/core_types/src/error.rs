//! Error types reported by the memory manager and the environment.
//!
//! Invariant violations inside the collector (count overflow, double free,
//! list corruption) are not represented here. They are assertions and abort
//! the operation that tripped them.

use thiserror::Error;

/// Failure to obtain storage for a new heap cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The system allocator returned no memory.
    #[error("out of memory allocating {size} byte heap cell")]
    OutOfMemory {
        /// Size in bytes of the failed request
        size: usize,
    },
}

/// A structural read or write through a handle did not match the value it
/// refers to.
///
/// # Examples
///
/// ```
/// use core_types::AccessError;
///
/// assert_eq!(AccessError::NotAPair.to_string(), "value is not a pair");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The handle refers to no cell.
    #[error("null handle")]
    NullHandle,
    /// A pair operation was applied to another kind of value.
    #[error("value is not a pair")]
    NotAPair,
    /// A vector operation was applied to another kind of value.
    #[error("value is not a vector")]
    NotAVector,
    /// A vector index was past the end.
    #[error("index {index} out of bounds for vector of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length of the vector
        len: usize,
    },
}

/// Binding arguments or assigning variables failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// Fewer arguments than positional parameters.
    #[error("insufficient number of arguments: expected {expected}, got {got}")]
    InsufficientArguments {
        /// Number of positional parameters
        expected: usize,
        /// Number of arguments supplied
        got: usize,
    },
    /// More arguments than parameters and no rest parameter to take them.
    #[error("redundant arguments: expected {expected}, got {got}")]
    RedundantArguments {
        /// Number of positional parameters
        expected: usize,
        /// Number of arguments supplied
        got: usize,
    },
    /// Assignment to a name with no binding in any enclosing scope.
    #[error("unbound variable: {0}")]
    Unbound(String),
}
