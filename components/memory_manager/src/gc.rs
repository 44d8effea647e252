//! Reference-count releases and the mark-and-sweep collector.
//!
//! Everything here runs with the heap lock held. Cells freed under the lock
//! are moved into a [`Graveyard`] that the caller drops after unlocking, so
//! payload destructors (closures letting go of their environments, which in
//! turn drop handles) never run inside the critical section.

use std::collections::HashSet;
use std::time::Instant;

use crate::handle::Slot;
use crate::heap::{HeapState, Shared};
use crate::mark_stack::MarkStack;
use crate::object::{ObjPtr, Object};
use crate::trace::Trace;

/// Freed cells whose destructors have not run yet.
pub(crate) type Graveyard = Vec<Box<Object>>;

/// A reference waiting to be released under the heap lock.
pub(crate) struct Pending(pub(crate) ObjPtr);

// SAFETY: the pointer is only dereferenced by whoever drains the queue, under
// the heap lock.
unsafe impl Send for Pending {}

/// Collector state, observable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPhase {
    /// No collection in progress
    #[default]
    Idle,
    /// Tracing from the roots
    Marking,
    /// Freeing unmarked cells
    Sweeping,
}

/// Drops one reference to `object`, freeing it and cascading through its
/// children when the count reaches zero.
pub(crate) fn release(state: &mut HeapState, object: ObjPtr, graveyard: &mut Graveyard) {
    let mut work = vec![object];
    while let Some(ptr) = work.pop() {
        // SAFETY: every pointer on the worklist carried a counted reference,
        // so the cell is still allocated.
        let cell = unsafe { ptr.as_ref() };
        if cell.release() > 0 {
            continue;
        }
        assert!(cell.is_linked(), "released a cell that is not on the heap");

        // SAFETY: the count is zero, so no handle or slot can reach the cell
        // and we own it exclusively from here.
        let mut freed = unsafe {
            state.objects.remove(ptr);
            Box::from_raw(ptr.as_ptr())
        };
        for slot in freed.value.get_mut().children_mut() {
            if let Some(child) = slot.take_object() {
                work.push(child);
            }
        }
        state.stats.eager_frees += 1;
        tracing::trace!(cell = ?ptr, "freed by reference count");
        graveyard.push(freed);
    }
}

/// Releases every reference queued by writers.
pub(crate) fn drain(state: &mut HeapState, shared: &Shared, graveyard: &mut Graveyard) {
    while let Some(Pending(object)) = shared.releases.pop() {
        release(state, object, graveyard);
    }
}

/// Collects if the live cell count is over the threshold.
pub(crate) fn maybe_collect(state: &mut HeapState, shared: &Shared, graveyard: &mut Graveyard) {
    if state.objects.len() > state.capacity {
        tracing::trace!(
            live = state.objects.len(),
            capacity = state.capacity,
            "collection triggered"
        );
        collect(state, shared, graveyard);
    }
}

/// Runs a full mark-and-sweep collection.
pub(crate) fn collect(state: &mut HeapState, shared: &Shared, graveyard: &mut Graveyard) {
    let started = Instant::now();
    let before = state.objects.len();

    shared.phase.store(GcPhase::Marking);
    let (pending, traced) = mark(state, shared);

    shared.phase.store(GcPhase::Sweeping);
    let swept = sweep(state, graveyard);

    for object in pending {
        release(state, object, graveyard);
    }
    drain(state, shared, graveyard);

    let live = state.objects.len();
    state.capacity = state.capacity.max(live + live / 2);
    state.stats.collections += 1;
    state.stats.swept += swept;
    shared.phase.store(GcPhase::Idle);

    tracing::debug!(
        before,
        after = live,
        swept,
        traced,
        capacity = state.capacity,
        elapsed_us = started.elapsed().as_micros() as u64,
        "collection finished"
    );
}

/// Marks every cell reachable from a root. References waiting in the
/// release queue are treated as roots for this cycle; they are returned so
/// the caller can release them after the sweep.
fn mark(state: &HeapState, shared: &Shared) -> (Vec<ObjPtr>, usize) {
    let mut stack = MarkStack::new();
    for node in state.roots.iter() {
        // SAFETY: root nodes are valid while on the list.
        stack.push(unsafe { node.as_ref() }.object);
    }

    let mut pending = Vec::new();
    loop {
        while let Some(ptr) = stack.pop() {
            // SAFETY: reachable cells are alive; nothing is freed while the
            // heap lock is held by the collector.
            let cell = unsafe { ptr.as_ref() };
            if !cell.mark() {
                continue;
            }
            let value = cell.value.read_recursive();
            value.trace(&mut |slot: &Slot| {
                if let Some(child) = slot.object() {
                    stack.push(child);
                }
            });
        }
        match shared.releases.pop() {
            Some(entry) => {
                pending.push(entry.0);
                stack.push(entry.0);
            }
            None => break,
        }
    }
    debug_assert_eq!(stack.len(), 0);
    (pending, stack.total_pushed())
}

/// Frees every unmarked cell and clears the mark on the rest. Returns the
/// number of cells freed.
fn sweep(state: &mut HeapState, graveyard: &mut Graveyard) -> usize {
    let mut doomed = Vec::new();
    for ptr in state.objects.iter() {
        // SAFETY: list members are alive.
        if !unsafe { ptr.as_ref() }.unmark() {
            doomed.push(ptr);
        }
    }
    if doomed.is_empty() {
        return 0;
    }

    // Unlink everything first so cascading releases below can tell garbage
    // from survivors.
    let garbage: HashSet<ObjPtr> = doomed.iter().copied().collect();
    for &ptr in &doomed {
        // SAFETY: `ptr` was just read from the list.
        unsafe { state.objects.remove(ptr) };
    }

    let mut survivors = Vec::new();
    let count = doomed.len();
    for ptr in doomed {
        // SAFETY: unmarked means unreachable from any root or slot of a live
        // cell, so nothing else can observe it.
        let mut freed = unsafe { Box::from_raw(ptr.as_ptr()) };
        for slot in freed.value.get_mut().children_mut() {
            if let Some(child) = slot.take_object() {
                if !garbage.contains(&child) {
                    survivors.push(child);
                }
            }
        }
        graveyard.push(freed);
    }
    for child in survivors {
        release(state, child, graveyard);
    }
    count
}
