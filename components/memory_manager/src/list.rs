//! Intrusive doubly linked lists.
//!
//! Heap cells and root nodes carry their own [`Links`], so inserting and
//! removing never allocates and removal is O(1) given the node pointer.
//! The lists themselves are not synchronized; every list in the heap lives
//! behind the heap mutex.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Link fields embedded in a list node.
pub(crate) struct Links<T> {
    prev: Cell<Option<NonNull<T>>>,
    next: Cell<Option<NonNull<T>>>,
    linked: Cell<bool>,
}

impl<T> Links<T> {
    pub(crate) const fn new() -> Self {
        Links {
            prev: Cell::new(None),
            next: Cell::new(None),
            linked: Cell::new(false),
        }
    }

    /// Whether the owning node is currently in a list.
    pub(crate) fn is_linked(&self) -> bool {
        self.linked.get()
    }
}

/// A type that can be threaded onto an [`IntrusiveList`].
pub(crate) trait Linked: Sized {
    fn links(&self) -> &Links<Self>;
}

/// An unowned list of nodes. Dropping the list does not touch the nodes.
pub(crate) struct IntrusiveList<T: Linked> {
    head: Option<NonNull<T>>,
    len: usize,
}

impl<T: Linked> IntrusiveList<T> {
    pub(crate) const fn new() -> Self {
        IntrusiveList { head: None, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `node` at the head.
    ///
    /// # Safety
    ///
    /// `node` must point to a live value that stays at the same address
    /// until it is removed from this list.
    pub(crate) unsafe fn push_front(&mut self, node: NonNull<T>) {
        let links = unsafe { node.as_ref() }.links();
        assert!(!links.linked.get(), "node is already linked");

        links.prev.set(None);
        links.next.set(self.head);
        if let Some(head) = self.head {
            unsafe { head.as_ref() }.links().prev.set(Some(node));
        }
        self.head = Some(node);
        links.linked.set(true);
        self.len += 1;
    }

    /// Unlinks `node`.
    ///
    /// # Safety
    ///
    /// `node` must be a live member of this list.
    pub(crate) unsafe fn remove(&mut self, node: NonNull<T>) {
        let links = unsafe { node.as_ref() }.links();
        assert!(links.linked.get(), "node is not linked");

        let prev = links.prev.replace(None);
        let next = links.next.replace(None);
        match prev {
            Some(prev) => unsafe { prev.as_ref() }.links().next.set(next),
            None => {
                assert!(self.head == Some(node), "list corrupted: head mismatch");
                self.head = next;
            }
        }
        if let Some(next) = next {
            unsafe { next.as_ref() }.links().prev.set(prev);
        }
        links.linked.set(false);
        self.len -= 1;
    }

    /// Iterates over node pointers from head to tail.
    ///
    /// The list cannot be modified while the iterator is alive, so every
    /// yielded pointer is valid for at least that long.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            _list: PhantomData,
        }
    }
}

pub(crate) struct Iter<'a, T: Linked> {
    next: Option<NonNull<T>>,
    _list: PhantomData<&'a IntrusiveList<T>>,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
    type Item = NonNull<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        // SAFETY: members stay valid while the list is borrowed.
        self.next = unsafe { current.as_ref() }.links().next.get();
        Some(current)
    }
}
