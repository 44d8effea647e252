//! Heap cells.
//!
//! An [`Object`] holds exactly one [`Value`] together with the bookkeeping
//! the collector needs: a reference count covering every handle and slot
//! that points at it, a mark flag for tracing, and the links threading it
//! onto the heap's list of live cells.

use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::heap::Shared;
use crate::list::{Linked, Links};
use crate::value::Value;

/// Pointer to a live heap cell.
pub(crate) type ObjPtr = NonNull<Object>;

/// Largest reference count a cell may carry (31 bits).
pub const MAX_REF_COUNT: u32 = 0x7FFF_FFFF;

/// A heap cell.
pub(crate) struct Object {
    links: Links<Object>,
    count: AtomicU32,
    marked: AtomicBool,
    pub(crate) heap: Arc<Shared>,
    pub(crate) value: RwLock<Value>,
}

// SAFETY: `links` and `marked` are only touched while the owning heap's
// mutex is held. The count is atomic and the payload sits behind a RwLock.
unsafe impl Send for Object {}
unsafe impl Sync for Object {}

impl Linked for Object {
    fn links(&self) -> &Links<Self> {
        &self.links
    }
}

impl Object {
    /// A fresh, unmarked cell with no references.
    pub(crate) fn new(value: Value, heap: Arc<Shared>) -> Self {
        Object {
            links: Links::new(),
            count: AtomicU32::new(0),
            marked: AtomicBool::new(false),
            heap,
            value: RwLock::new(value),
        }
    }

    pub(crate) fn ref_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Adds one reference.
    ///
    /// Lock-free; the caller must already own a reference that keeps the
    /// cell alive, or hold the heap lock.
    pub(crate) fn retain(&self) {
        let previous = self.count.fetch_add(1, Ordering::Relaxed);
        assert!(previous < MAX_REF_COUNT, "reference count overflow");
    }

    /// Drops one reference and returns the remaining count.
    ///
    /// Only called with the heap lock held.
    pub(crate) fn release(&self) -> u32 {
        let previous = self.count.fetch_sub(1, Ordering::Release);
        assert!(previous > 0, "reference count underflow (double free)");
        if previous == 1 {
            fence(Ordering::Acquire);
        }
        previous - 1
    }

    /// Sets the mark flag. Returns true if the cell was not marked before.
    pub(crate) fn mark(&self) -> bool {
        !self.marked.swap(true, Ordering::Relaxed)
    }

    /// Clears the mark flag. Returns whether it was set.
    pub(crate) fn unmark(&self) -> bool {
        self.marked.swap(false, Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Relaxed)
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.links.is_linked()
    }

    pub(crate) fn same_heap(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.heap, &other.heap)
    }
}
