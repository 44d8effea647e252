//! Mark stack for the tracing phase.
//!
//! Marking is iterative: cells waiting to be scanned sit on a LIFO work
//! deque instead of the call stack, so deep lists cannot overflow it.

use crossbeam_deque::Worker;

use crate::object::ObjPtr;

/// Gray cells: reached but not yet scanned.
pub(crate) struct MarkStack {
    local: Worker<ObjPtr>,
    /// Number of items currently on the stack
    size: usize,
    /// Total pushes over the stack's lifetime
    pushed: usize,
}

impl MarkStack {
    pub(crate) fn new() -> Self {
        MarkStack {
            local: Worker::new_lifo(),
            size: 0,
            pushed: 0,
        }
    }

    pub(crate) fn push(&mut self, obj: ObjPtr) {
        self.local.push(obj);
        self.size += 1;
        self.pushed += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<ObjPtr> {
        let obj = self.local.pop()?;
        self.size -= 1;
        Some(obj)
    }

    pub(crate) fn len(&self) -> usize {
        self.size
    }

    /// Pushes over the whole mark phase, for logging.
    pub(crate) fn total_pushed(&self) -> usize {
        self.pushed
    }
}
