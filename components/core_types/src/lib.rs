//! Shared scalar types and error definitions for the runtime.
//!
//! This crate holds the pieces of the runtime that carry no heap
//! references: interned-style symbol names, the tag describing which shape
//! a heap value has, and the error types reported by the memory manager and
//! the variable environment.
//!
//! # Overview
//!
//! - [`Symbol`] - A symbol name as it appears in source
//! - [`ValueKind`] - Tag naming the active variant of a heap value
//! - [`HeapError`] - Allocation failures
//! - [`AccessError`] - Structural access through a handle failed
//! - [`BindError`] - Variable binding failed
//!
//! # Examples
//!
//! ```
//! use core_types::{AccessError, Symbol, ValueKind};
//!
//! let sym = Symbol::new("lambda");
//! assert_eq!(sym.to_string(), "lambda");
//!
//! assert_eq!(ValueKind::Pair.name(), "pair");
//!
//! let err = AccessError::IndexOutOfBounds { index: 4, len: 2 };
//! assert_eq!(err.to_string(), "index 4 out of bounds for vector of length 2");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod symbol;
mod value;

pub use error::{AccessError, BindError, HeapError};
pub use symbol::Symbol;
pub use value::ValueKind;
