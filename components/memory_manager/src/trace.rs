//! Child enumeration.
//!
//! This is the only place that knows which values embed references. The
//! collector marks through [`Trace::trace`], and frees through
//! [`Trace::children_mut`] so it can null every slot before a cell goes
//! away. Order is fixed: a pair yields `first` then `second`, a vector
//! yields its elements by index, everything else yields nothing.

use crate::handle::Slot;
use crate::value::Value;

/// Visitor over embedded slots.
pub trait Tracer {
    /// Called once per slot, including null ones.
    fn visit(&mut self, slot: &Slot);
}

impl<F: FnMut(&Slot)> Tracer for F {
    fn visit(&mut self, slot: &Slot) {
        self(slot)
    }
}

/// Values that can report the slots they own.
pub trait Trace {
    /// Feeds every owned slot to `tracer`.
    fn trace<T: Tracer + ?Sized>(&self, tracer: &mut T);

    /// Owned slots, in trace order.
    fn children(&self) -> Vec<&Slot>;

    /// Owned slots, mutably, in trace order.
    fn children_mut(&mut self) -> Vec<&mut Slot>;
}

impl Trace for Value {
    fn trace<T: Tracer + ?Sized>(&self, tracer: &mut T) {
        match self {
            Value::Pair(pair) => {
                tracer.visit(&pair.first);
                tracer.visit(&pair.second);
            }
            Value::Vector(vector) => {
                for slot in &vector.elements {
                    tracer.visit(slot);
                }
            }
            // Closure environments live outside the heap.
            _ => {}
        }
    }

    fn children(&self) -> Vec<&Slot> {
        match self {
            Value::Pair(pair) => vec![&pair.first, &pair.second],
            Value::Vector(vector) => vector.elements.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Slot> {
        match self {
            Value::Pair(pair) => vec![&mut pair.first, &mut pair.second],
            Value::Vector(vector) => vector.elements.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}
