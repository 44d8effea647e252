//! Memory Manager - hybrid reference-counting and tracing heap
//!
//! This component provides:
//! - Heap cells holding runtime [`Value`]s, threaded on an intrusive list
//! - Root [`Handle`]s and embedded [`Slot`]s with eager reference counting
//! - A stop-the-world mark-and-sweep collector for cyclic garbage
//! - A capacity threshold that grows to one and a half times the survivors
//! - Lexical [`Environment`]s captured by closures
//! - Read-only snapshots of live cells and roots for diagnostics
//!
//! # Examples
//!
//! ```
//! use memory_manager::{Heap, Value};
//!
//! let heap = Heap::new();
//! let list = heap.list(vec![
//!     heap.allocate(Value::Integer(1)),
//!     heap.allocate(Value::Integer(2)),
//! ]);
//! assert_eq!(heap.stats().live_objects, 4);
//!
//! drop(list);
//! assert_eq!(heap.stats().live_objects, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod env;
mod gc;
mod handle;
mod heap;
mod list;
mod mark_stack;
mod object;
mod trace;
mod value;

pub use env::Environment;
pub use gc::GcPhase;
pub use handle::{Handle, Slot, ValueRef};
pub use heap::{
    allocate_root, collect_now, global, Heap, HeapConfig, HeapStats, ObjectInfo, RootInfo,
    DEFAULT_CAPACITY,
};
pub use object::MAX_REF_COUNT;
pub use trace::{Trace, Tracer};
pub use value::{Closure, NativeFn, Pair, Primitive, Value, Vector};

pub use core_types::{AccessError, BindError, HeapError, Symbol, ValueKind};
