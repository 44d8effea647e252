//! Root and embedded references.
//!
//! A [`Handle`] is a root: it owns a node on the heap's root list, and the
//! collector starts tracing from it. A [`Slot`] is a reference stored inside
//! a pair or vector and is found only by tracing its parent. Both count
//! toward the target's reference count.
//!
//! Building a structure from handles (`Value::pair`, `Value::vector`) turns
//! each handle into a slot that still holds the handle's root node as an
//! *anchor*. The anchor keeps the target rooted until the structure lands in
//! a cell; allocation (or [`Handle::set`]) then unlinks it under the heap
//! lock, so ownership moves from the stack to the heap without a window in
//! which a collection could miss the target.
//!
//! # Locking
//!
//! Lock order is heap lock, then cell read lock, or cell read lock, then heap
//! lock. Writers hold a cell's write lock only while swapping slots and never
//! take the heap lock while holding it. References displaced by a writer are
//! pushed onto the heap's deferred-release queue before the write lock is
//! dropped and released later under the heap lock.

use std::fmt;
use std::mem::{self, ManuallyDrop};
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use core_types::{AccessError, ValueKind};
use parking_lot::RwLockReadGuard;

use crate::gc::{self, Graveyard, Pending};
use crate::heap::{self, Heap, HeapState};
use crate::list::{Linked, Links};
use crate::object::{ObjPtr, Object};
use crate::trace::Trace;
use crate::value::Value;

pub(crate) type NodePtr = NonNull<RootNode>;

/// An entry on the heap's root list.
pub(crate) struct RootNode {
    links: Links<RootNode>,
    pub(crate) object: ObjPtr,
}

impl Linked for RootNode {
    fn links(&self) -> &Links<Self> {
        &self.links
    }
}

/// Registers a new root for `object`. The caller holds the heap lock and a
/// reference that keeps `object` alive.
pub(crate) unsafe fn register_locked(state: &mut HeapState, object: ObjPtr) -> Handle {
    unsafe { object.as_ref() }.retain();
    let node = NonNull::from(Box::leak(Box::new(RootNode {
        links: Links::new(),
        object,
    })));
    unsafe { state.roots.push_front(node) };
    Handle { root: Some(node) }
}

/// Unlinks and frees a root node without touching its cell's count.
pub(crate) unsafe fn free_root(state: &mut HeapState, node: NodePtr) {
    unsafe {
        state.roots.remove(node);
        drop(Box::from_raw(node.as_ptr()));
    }
}

/// Strips the anchors from every slot in `value`. The returned nodes are
/// still on the root list and must be passed to [`free_root`] once `value`
/// is reachable from a cell.
pub(crate) fn detach_anchors(value: &mut Value) -> Vec<NodePtr> {
    value
        .children_mut()
        .into_iter()
        .filter_map(Slot::detach_anchor)
        .collect()
}

fn lock_and_free_roots(shared: &heap::Shared, anchors: Vec<NodePtr>) {
    let mut graveyard = Graveyard::new();
    {
        let mut state = shared.state.lock();
        for node in anchors {
            // SAFETY: detached anchors are still on this heap's root list and
            // nothing else owns them.
            unsafe { free_root(&mut state, node) };
        }
        gc::drain(&mut state, shared, &mut graveyard);
    }
    drop(graveyard);
}

/// A rooted, nullable reference to a heap cell.
///
/// Cloning registers another root. Dropping the last reference to an
/// acyclic structure frees it immediately; cyclic garbage waits for the next
/// collection.
///
/// # Examples
///
/// ```
/// use memory_manager::{Heap, Value};
///
/// let heap = Heap::new();
/// let a = heap.allocate(Value::Integer(1));
/// let b = heap.allocate(Value::Integer(2));
/// let pair = heap.allocate(Value::pair(a, b));
///
/// assert_eq!(pair.first().unwrap().read().as_integer(), Some(1));
/// assert_eq!(pair.second().unwrap().read().as_integer(), Some(2));
/// ```
pub struct Handle {
    root: Option<NodePtr>,
}

// SAFETY: the root node is owned by this handle and only unlinked under the
// heap lock. The cell is reference counted and internally synchronized.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    /// A handle that refers to nothing.
    pub const fn null() -> Self {
        Handle { root: None }
    }

    /// Allocates `value` on the process-wide heap.
    pub fn new(value: Value) -> Self {
        heap::global().allocate(value)
    }

    pub(crate) fn object(&self) -> Option<ObjPtr> {
        // SAFETY: the node lives as long as this handle.
        self.root.map(|node| unsafe { node.as_ref() }.object)
    }

    fn cell(&self) -> Result<&Object, AccessError> {
        // SAFETY: our reference keeps the cell alive while `self` is borrowed.
        self.object()
            .map(|obj| unsafe { &*obj.as_ptr() })
            .ok_or(AccessError::NullHandle)
    }

    /// True if this handle refers to nothing.
    pub fn is_null(&self) -> bool {
        self.root.is_none()
    }

    /// True if both handles refer to the same cell, or both are null.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        self.object() == other.object()
    }

    /// Address of the referenced cell, for diagnostics.
    pub fn address(&self) -> Option<usize> {
        self.object().map(|obj| obj.as_ptr() as usize)
    }

    /// Current reference count of the referenced cell.
    pub fn ref_count(&self) -> Option<u32> {
        self.cell().ok().map(Object::ref_count)
    }

    /// The heap this handle's cell lives in.
    pub fn heap(&self) -> Option<Heap> {
        let cell = self.cell().ok()?;
        Some(Heap::from_shared(Arc::clone(&cell.heap)))
    }

    /// Borrows the value. A null handle reads as [`Value::Null`].
    ///
    /// Writers on the same cell block until the guard is dropped, so do not
    /// call a setter on this cell while holding it.
    pub fn read(&self) -> ValueRef<'_> {
        ValueRef {
            guard: self.cell().ok().map(|cell| cell.value.read_recursive()),
        }
    }

    /// Kind of the referenced value; [`ValueKind::Null`] for a null handle.
    pub fn kind(&self) -> ValueKind {
        self.read().kind()
    }

    /// A new root for the car of a pair.
    pub fn first(&self) -> Result<Handle, AccessError> {
        let value = self.cell()?.value.read_recursive();
        match &*value {
            Value::Pair(pair) => Ok(pair.first.get()),
            _ => Err(AccessError::NotAPair),
        }
    }

    /// A new root for the cdr of a pair.
    pub fn second(&self) -> Result<Handle, AccessError> {
        let value = self.cell()?.value.read_recursive();
        match &*value {
            Value::Pair(pair) => Ok(pair.second.get()),
            _ => Err(AccessError::NotAPair),
        }
    }

    /// A new root for element `index` of a vector.
    pub fn element(&self, index: usize) -> Result<Handle, AccessError> {
        let value = self.cell()?.value.read_recursive();
        match &*value {
            Value::Vector(vector) => {
                let len = vector.len();
                vector
                    .get(index)
                    .map(Slot::get)
                    .ok_or(AccessError::IndexOutOfBounds { index, len })
            }
            _ => Err(AccessError::NotAVector),
        }
    }

    /// Length of a vector.
    pub fn len(&self) -> Result<usize, AccessError> {
        match &*self.cell()?.value.read_recursive() {
            Value::Vector(vector) => Ok(vector.len()),
            _ => Err(AccessError::NotAVector),
        }
    }

    /// True if the vector has no elements.
    pub fn is_empty(&self) -> Result<bool, AccessError> {
        self.len().map(|len| len == 0)
    }

    /// Replaces the whole value of the referenced cell.
    pub fn set(&self, value: Value) -> Result<(), AccessError> {
        let cell = self.cell()?;
        let mut value = value;
        debug_assert!(
            value.children().iter().all(|slot| slot.in_heap_of(cell)),
            "slot refers to a cell in another heap"
        );
        let anchors = detach_anchors(&mut value);
        self.modify(anchors, move |current| {
            Ok(Displaced::Value(mem::replace(current, value)))
        })
    }

    /// Points the car of a pair at `target`.
    pub fn set_first(&self, target: &Handle) -> Result<(), AccessError> {
        self.check_heap(target)?;
        let object = target.object();
        self.modify(Vec::new(), |current| match current {
            Value::Pair(pair) => Ok(Displaced::Slot(mem::replace(
                &mut pair.first,
                Slot::retained(object),
            ))),
            _ => Err(AccessError::NotAPair),
        })
    }

    /// Points the cdr of a pair at `target`.
    pub fn set_second(&self, target: &Handle) -> Result<(), AccessError> {
        self.check_heap(target)?;
        let object = target.object();
        self.modify(Vec::new(), |current| match current {
            Value::Pair(pair) => Ok(Displaced::Slot(mem::replace(
                &mut pair.second,
                Slot::retained(object),
            ))),
            _ => Err(AccessError::NotAPair),
        })
    }

    /// Points element `index` of a vector at `target`.
    pub fn set_element(&self, index: usize, target: &Handle) -> Result<(), AccessError> {
        self.check_heap(target)?;
        let object = target.object();
        self.modify(Vec::new(), |current| match current {
            Value::Vector(vector) => {
                let len = vector.len();
                let slot = vector
                    .elements
                    .get_mut(index)
                    .ok_or(AccessError::IndexOutOfBounds { index, len })?;
                Ok(Displaced::Slot(mem::replace(slot, Slot::retained(object))))
            }
            _ => Err(AccessError::NotAVector),
        })
    }

    /// Appends `target` to a vector.
    pub fn push(&self, target: &Handle) -> Result<(), AccessError> {
        self.check_heap(target)?;
        let object = target.object();
        self.modify(Vec::new(), |current| match current {
            Value::Vector(vector) => {
                vector.elements.push(Slot::retained(object));
                Ok(Displaced::Nothing)
            }
            _ => Err(AccessError::NotAVector),
        })
    }

    fn check_heap(&self, target: &Handle) -> Result<(), AccessError> {
        let cell = self.cell()?;
        if let Ok(other) = target.cell() {
            debug_assert!(cell.same_heap(other), "handles belong to different heaps");
        }
        Ok(())
    }

    /// Runs `edit` under the cell's write lock, queues every reference it
    /// displaced for release, then settles `anchors` and the queue under the
    /// heap lock.
    fn modify<F>(&self, anchors: Vec<NodePtr>, edit: F) -> Result<(), AccessError>
    where
        F: FnOnce(&mut Value) -> Result<Displaced, AccessError>,
    {
        let cell = self.cell()?;
        let result = {
            let mut current = cell.value.write();
            edit(&mut current).map(|mut displaced| {
                for slot in displaced.slots_mut() {
                    if let Some(object) = slot.take_object() {
                        cell.heap.releases.push(Pending(object));
                    }
                }
                displaced
            })
        };
        // Displaced payloads may own closures whose environments hold
        // handles; they are dropped with no cell lock held.
        let result = result.map(drop);
        lock_and_free_roots(&cell.heap, anchors);
        result
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::null()
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        match self.object() {
            None => Handle::null(),
            // SAFETY: `self` keeps the cell alive.
            Some(object) => unsafe { register(object) },
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let Some(node) = self.root.take() else {
            return;
        };
        // SAFETY: the node is ours and our reference keeps its cell alive
        // until the release below.
        let object = unsafe { node.as_ref() }.object;
        let shared = Arc::clone(&unsafe { object.as_ref() }.heap);
        let mut graveyard = Graveyard::new();
        {
            let mut state = shared.state.lock();
            unsafe { free_root(&mut state, node) };
            gc::release(&mut state, object, &mut graveyard);
            gc::drain(&mut state, &shared, &mut graveyard);
            if shared.config.collect_on_release {
                gc::maybe_collect(&mut state, &shared, &mut graveyard);
            }
        }
        drop(graveyard);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object() {
            Some(object) => write!(f, "Handle({:p})", object.as_ptr()),
            None => f.write_str("Handle(null)"),
        }
    }
}

/// Registers a new root for `object`, taking the heap lock.
unsafe fn register(object: ObjPtr) -> Handle {
    let shared = &unsafe { object.as_ref() }.heap;
    let mut state = shared.state.lock();
    unsafe { register_locked(&mut state, object) }
}

/// Shared borrow of a cell's value.
///
/// Dereferences to [`Value::Null`] for null handles and null slots.
pub struct ValueRef<'a> {
    guard: Option<RwLockReadGuard<'a, Value>>,
}

static NULL_VALUE: Value = Value::Null;

impl Deref for ValueRef<'_> {
    type Target = Value;

    fn deref(&self) -> &Value {
        match &self.guard {
            Some(guard) => guard,
            None => &NULL_VALUE,
        }
    }
}

impl fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// A reference embedded in a pair or vector.
///
/// Slots are not roots. Read one through its parent's guard and call
/// [`Slot::get`] to obtain a root that outlives the guard. Slots of a swept
/// cell are nulled before the cell is freed.
pub struct Slot {
    object: Option<ObjPtr>,
    anchor: Option<NodePtr>,
}

// SAFETY: see `Handle`. An anchored slot is only reachable by its owner
// until the anchor is unlinked under the heap lock.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    /// A slot that refers to nothing.
    pub const fn null() -> Self {
        Slot {
            object: None,
            anchor: None,
        }
    }

    /// Takes one new reference to `object`, which must be kept alive by the
    /// caller.
    pub(crate) fn retained(object: Option<ObjPtr>) -> Self {
        if let Some(object) = object {
            // SAFETY: the caller's reference keeps the cell alive.
            unsafe { object.as_ref() }.retain();
        }
        Slot {
            object,
            anchor: None,
        }
    }

    pub(crate) fn object(&self) -> Option<ObjPtr> {
        self.object
    }

    /// Nulls the slot and hands its reference to the caller.
    pub(crate) fn take_object(&mut self) -> Option<ObjPtr> {
        debug_assert!(self.anchor.is_none(), "anchored slot inside a cell");
        self.object.take()
    }

    pub(crate) fn detach_anchor(&mut self) -> Option<NodePtr> {
        self.anchor.take()
    }

    fn in_heap_of(&self, cell: &Object) -> bool {
        match self.object {
            // SAFETY: the slot's reference keeps the cell alive.
            Some(object) => unsafe { object.as_ref() }.same_heap(cell),
            None => true,
        }
    }

    /// True if the slot refers to nothing.
    pub fn is_null(&self) -> bool {
        self.object.is_none()
    }

    /// True if the slot refers to the same cell as `handle`.
    pub fn refers_to(&self, handle: &Handle) -> bool {
        self.object == handle.object()
    }

    /// A new root for the referenced cell.
    pub fn get(&self) -> Handle {
        match self.object {
            None => Handle::null(),
            // SAFETY: the slot's reference keeps the cell alive, and the
            // parent cannot drop it while the caller borrows the slot.
            Some(object) => unsafe { register(object) },
        }
    }

    /// Borrows the referenced value. A null slot reads as [`Value::Null`].
    pub fn read(&self) -> ValueRef<'_> {
        ValueRef {
            // SAFETY: as in `get`.
            guard: self
                .object
                .map(|object| unsafe { &*object.as_ptr() }.value.read_recursive()),
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::null()
    }
}

impl From<Handle> for Slot {
    fn from(handle: Handle) -> Self {
        let handle = ManuallyDrop::new(handle);
        match handle.root {
            None => Slot::null(),
            Some(node) => Slot {
                // SAFETY: the node moves into the slot as its anchor.
                object: Some(unsafe { node.as_ref() }.object),
                anchor: Some(node),
            },
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };
        // SAFETY: our reference keeps the cell alive until released.
        let shared = Arc::clone(&unsafe { object.as_ref() }.heap);
        let mut graveyard = Graveyard::new();
        match self.anchor.take() {
            Some(node) => {
                let mut state = shared.state.lock();
                unsafe { free_root(&mut state, node) };
                gc::release(&mut state, object, &mut graveyard);
                gc::drain(&mut state, &shared, &mut graveyard);
            }
            None => {
                shared.releases.push(Pending(object));
                if let Some(mut state) = shared.state.try_lock() {
                    gc::drain(&mut state, &shared, &mut graveyard);
                }
            }
        }
        drop(graveyard);
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object {
            Some(object) => write!(f, "Slot({:p})", object.as_ptr()),
            None => f.write_str("Slot(null)"),
        }
    }
}

/// What a writer removed from a cell.
enum Displaced {
    Nothing,
    Slot(Slot),
    Value(Value),
}

impl Displaced {
    fn slots_mut(&mut self) -> Vec<&mut Slot> {
        match self {
            Displaced::Nothing => Vec::new(),
            Displaced::Slot(slot) => vec![slot],
            Displaced::Value(value) => value.children_mut(),
        }
    }
}
