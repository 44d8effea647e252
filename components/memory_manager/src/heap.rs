//! The heap: allocation, collection triggers and diagnostics.
//!
//! A [`Heap`] is a cheap, clonable handle to shared state guarded by one
//! mutex: the list of every live cell, the list of every root, and the
//! capacity threshold. Allocation links a new cell and registers its first
//! root in the same critical section, then collects if the live count has
//! passed the threshold. After each collection the threshold becomes
//! `max(capacity, live + live / 2)`, so it never shrinks.

use std::alloc::{alloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

use core_types::{HeapError, ValueKind};
use crossbeam::atomic::AtomicCell;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;

use crate::gc::{self, GcPhase, Graveyard, Pending};
use crate::handle::{self, Handle, RootNode, Slot};
use crate::list::IntrusiveList;
use crate::object::Object;
use crate::trace::Trace;
use crate::value::Value;

/// Initial collection threshold, in live cells.
pub const DEFAULT_CAPACITY: usize = 0x1000;

/// Heap tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Live cell count above which the first collection runs
    pub initial_capacity: usize,
    /// Check the threshold after every allocation
    pub collect_on_allocate: bool,
    /// Check the threshold whenever a root is dropped
    pub collect_on_release: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            initial_capacity: DEFAULT_CAPACITY,
            collect_on_allocate: true,
            collect_on_release: true,
        }
    }
}

/// Counters reported by [`Heap::stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Cells allocated over the heap's lifetime
    pub allocations: usize,
    /// Cells freed because their count reached zero
    pub eager_frees: usize,
    /// Completed collections
    pub collections: usize,
    /// Cells freed by sweeping
    pub swept: usize,
    /// Cells currently live
    pub live_objects: usize,
    /// Roots currently registered
    pub roots: usize,
    /// Current collection threshold
    pub capacity: usize,
}

/// One live cell, as seen by [`Heap::objects`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Address of the cell
    pub address: usize,
    /// Reference count at the time of the snapshot
    pub ref_count: u32,
    /// Kind of the cell's value
    pub kind: ValueKind,
}

/// One root, as seen by [`Heap::roots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootInfo {
    /// Address of the cell the root refers to
    pub target: usize,
}

/// Lists and counters guarded by the heap lock.
pub(crate) struct HeapState {
    pub(crate) objects: IntrusiveList<Object>,
    pub(crate) roots: IntrusiveList<RootNode>,
    pub(crate) capacity: usize,
    pub(crate) stats: HeapStats,
}

// SAFETY: the raw list pointers are only followed while the mutex that owns
// this state is held.
unsafe impl Send for HeapState {}

pub(crate) struct Shared {
    pub(crate) state: Mutex<HeapState>,
    /// References displaced by writers, released by the next lock holder.
    pub(crate) releases: SegQueue<Pending>,
    pub(crate) phase: AtomicCell<GcPhase>,
    pub(crate) config: HeapConfig,
}

impl Shared {
    pub(crate) fn new(config: HeapConfig) -> Self {
        Shared {
            state: Mutex::new(HeapState {
                objects: IntrusiveList::new(),
                roots: IntrusiveList::new(),
                capacity: config.initial_capacity,
                stats: HeapStats::default(),
            }),
            releases: SegQueue::new(),
            phase: AtomicCell::new(GcPhase::Idle),
            config,
        }
    }
}

/// A garbage-collected heap.
///
/// # Examples
///
/// ```
/// use memory_manager::{Heap, Handle, Value};
///
/// let heap = Heap::new();
/// let a = heap.allocate(Value::pair(Handle::null(), Handle::null()));
/// let b = heap.allocate(Value::pair(a.clone(), Handle::null()));
/// a.set_second(&b).unwrap();
///
/// drop((a, b));
/// assert_eq!(heap.stats().live_objects, 2);
///
/// heap.collect_now();
/// assert_eq!(heap.stats().live_objects, 0);
/// ```
#[derive(Clone)]
pub struct Heap {
    shared: Arc<Shared>,
}

impl Heap {
    /// Creates a heap with the default configuration.
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Creates a heap with custom tuning.
    pub fn with_config(config: HeapConfig) -> Self {
        Heap {
            shared: Arc::new(Shared::new(config)),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Heap { shared }
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// The configuration this heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.shared.config
    }

    /// True if `slot` is null or refers to a cell of this heap.
    fn owns(&self, slot: &Slot) -> bool {
        match slot.object() {
            // SAFETY: the slot holds a reference to its target.
            Some(child) => Arc::ptr_eq(&unsafe { child.as_ref() }.heap, &self.shared),
            None => true,
        }
    }

    /// Places `value` in a new cell and returns its first root.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::OutOfMemory`] if the system allocator fails. The
    /// value is dropped in that case.
    pub fn try_allocate(&self, value: Value) -> Result<Handle, HeapError> {
        let layout = Layout::new::<Object>();
        let size = layout.size();
        // SAFETY: `Object` is not zero-sized.
        let raw = unsafe { alloc(layout) }.cast::<Object>();
        let ptr = NonNull::new(raw).ok_or(HeapError::OutOfMemory { size })?;

        let mut value = value;
        debug_assert!(
            value.children().iter().all(|slot| self.owns(slot)),
            "value refers to a cell in another heap"
        );
        let anchors = handle::detach_anchors(&mut value);
        let object = Object::new(value, Arc::clone(&self.shared));
        // SAFETY: fresh allocation with the layout of `Object`; it is freed
        // through `Box`, which uses the same layout.
        unsafe { ptr.as_ptr().write(object) };

        let mut graveyard = Graveyard::new();
        let root = {
            let mut state = self.shared.state.lock();
            // SAFETY: the cell was just initialized and is not on any list.
            let root = unsafe {
                state.objects.push_front(ptr);
                handle::register_locked(&mut state, ptr)
            };
            for node in anchors {
                // SAFETY: the anchors' targets are now reachable through the
                // new cell, which is rooted above.
                unsafe { handle::free_root(&mut state, node) };
            }
            state.stats.allocations += 1;
            gc::drain(&mut state, &self.shared, &mut graveyard);
            if self.shared.config.collect_on_allocate {
                gc::maybe_collect(&mut state, &self.shared, &mut graveyard);
            }
            root
        };
        drop(graveyard);
        Ok(root)
    }

    /// Places `value` in a new cell and returns its first root.
    ///
    /// Aborts the process through [`handle_alloc_error`] if the system is out
    /// of memory.
    pub fn allocate(&self, value: Value) -> Handle {
        match self.try_allocate(value) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(%err, "heap allocation failed");
                handle_alloc_error(Layout::new::<Object>())
            }
        }
    }

    /// Builds a proper list: a chain of pairs whose cdrs end in a null
    /// handle. An empty input yields a null handle.
    pub fn list<I>(&self, items: I) -> Handle
    where
        I: IntoIterator<Item = Handle>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Handle::null(), |tail, item| {
                self.allocate(Value::pair(item, tail))
            })
    }

    /// Runs a full collection now, regardless of the threshold.
    pub fn collect_now(&self) {
        let mut graveyard = Graveyard::new();
        {
            let mut state = self.shared.state.lock();
            gc::drain(&mut state, &self.shared, &mut graveyard);
            gc::collect(&mut state, &self.shared, &mut graveyard);
        }
        drop(graveyard);
    }

    /// Current collector phase.
    pub fn phase(&self) -> GcPhase {
        self.shared.phase.load()
    }

    /// Counters and sizes.
    pub fn stats(&self) -> HeapStats {
        let state = self.shared.state.lock();
        HeapStats {
            live_objects: state.objects.len(),
            roots: state.roots.len(),
            capacity: state.capacity,
            ..state.stats
        }
    }

    /// Number of live cells.
    pub fn live_objects(&self) -> usize {
        self.shared.state.lock().objects.len()
    }

    /// Current collection threshold.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }

    /// Snapshot of every live cell, newest first.
    pub fn objects(&self) -> Vec<ObjectInfo> {
        let state = self.shared.state.lock();
        state
            .objects
            .iter()
            .map(|ptr| {
                // SAFETY: list members are alive while the lock is held.
                let cell = unsafe { ptr.as_ref() };
                ObjectInfo {
                    address: ptr.as_ptr() as usize,
                    ref_count: cell.ref_count(),
                    kind: cell.value.read_recursive().kind(),
                }
            })
            .collect()
    }

    /// Snapshot of every root, newest first.
    pub fn roots(&self) -> Vec<RootInfo> {
        let state = self.shared.state.lock();
        state
            .roots
            .iter()
            .map(|node| RootInfo {
                // SAFETY: as in `objects`.
                target: unsafe { node.as_ref() }.object.as_ptr() as usize,
            })
            .collect()
    }

    /// True if both values are handles to the same heap.
    pub fn ptr_eq(&self, other: &Heap) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("config", &self.shared.config)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

static GLOBAL: OnceLock<Heap> = OnceLock::new();

/// The process-wide heap used by [`Handle::new`] and [`allocate_root`].
pub fn global() -> &'static Heap {
    GLOBAL.get_or_init(Heap::new)
}

/// Allocates `value` on the process-wide heap.
pub fn allocate_root(value: Value) -> Handle {
    global().allocate(value)
}

/// Collects the process-wide heap.
pub fn collect_now() {
    global().collect_now()
}
