//! Runtime values stored in heap cells.
//!
//! [`Value`] is a closed set of shapes. Leaf variants own no references.
//! [`Pair`] and [`Vector`] own embedded [`Slot`]s and are the only way one
//! cell can refer to another, so they are the only source of cycles.
//! A [`Closure`] keeps its environment through shared ownership outside the
//! heap; the collector never looks inside it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use core_types::{Symbol, ValueKind};

use crate::env::Environment;
use crate::handle::{Handle, Slot};
use crate::heap::Heap;

/// Signature of a native function.
pub type NativeFn = fn(&Heap, &[Handle]) -> Handle;

/// A runtime value.
#[derive(Debug, Default)]
pub enum Value {
    /// The empty value
    #[default]
    Null,
    /// Boolean
    Boolean(bool),
    /// Character
    Character(char),
    /// 64-bit signed integer
    Integer(i64),
    /// Double-precision float
    Double(f64),
    /// Owned string
    String(String),
    /// Symbol
    Symbol(Symbol),
    /// Two embedded references
    Pair(Pair),
    /// Ordered embedded references
    Vector(Vector),
    /// Code plus captured environment
    Closure(Closure),
    /// Native function
    Primitive(Primitive),
}

/// A cons cell.
#[derive(Debug)]
pub struct Pair {
    /// The car
    pub first: Slot,
    /// The cdr
    pub second: Slot,
}

/// A growable array of references.
#[derive(Debug, Default)]
pub struct Vector {
    /// Elements in index order
    pub elements: Vec<Slot>,
}

impl Vector {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The slot at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.elements.get(index)
    }
}

/// A user-defined procedure.
///
/// `code` is owned by the evaluator (typically its lambda AST node) and is
/// opaque to the heap. `env` is the captured scope. Neither is traced, so a
/// cycle that runs through a captured environment is not reclaimed.
#[derive(Clone)]
pub struct Closure {
    /// Evaluator-owned code
    pub code: Arc<dyn Any + Send + Sync>,
    /// Captured scope
    pub env: Arc<Environment>,
}

impl Closure {
    /// Creates a closure over `env`.
    pub fn new(code: Arc<dyn Any + Send + Sync>, env: Arc<Environment>) -> Self {
        Closure { code, env }
    }

    /// Downcasts the code to the evaluator's concrete type.
    pub fn code<T: Any>(&self) -> Option<&T> {
        self.code.downcast_ref::<T>()
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("env", &Arc::as_ptr(&self.env))
            .finish_non_exhaustive()
    }
}

/// A native procedure.
#[derive(Clone, Copy)]
pub struct Primitive {
    /// Name used in diagnostics
    pub name: &'static str,
    /// The function
    pub func: NativeFn,
}

impl Primitive {
    /// Wraps a native function.
    pub fn new(name: &'static str, func: NativeFn) -> Self {
        Primitive { name, func }
    }

    /// Invokes the function.
    pub fn call(&self, heap: &Heap, args: &[Handle]) -> Handle {
        (self.func)(heap, args)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<primitive {}>", self.name)
    }
}

impl Value {
    /// Builds a pair that takes over `first` and `second`.
    ///
    /// The handles stay rooted until the pair is placed on the heap.
    pub fn pair(first: Handle, second: Handle) -> Value {
        Value::Pair(Pair {
            first: Slot::from(first),
            second: Slot::from(second),
        })
    }

    /// Builds a vector that takes over `elements`.
    pub fn vector(elements: impl IntoIterator<Item = Handle>) -> Value {
        Value::Vector(Vector {
            elements: elements.into_iter().map(Slot::from).collect(),
        })
    }

    /// Builds a string value.
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    /// Builds a symbol value.
    pub fn symbol(name: impl Into<Symbol>) -> Value {
        Value::Symbol(name.into())
    }

    /// The tag of the active variant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Character(_) => ValueKind::Character,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::Pair(_) => ValueKind::Pair,
            Value::Vector(_) => ValueKind::Vector,
            Value::Closure(_) => ValueKind::Closure,
            Value::Primitive(_) => ValueKind::Primitive,
        }
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this is one.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The symbol, if this is one.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The pair, if this is one.
    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Value::Pair(p) => Some(p),
            _ => None,
        }
    }

    /// The vector, if this is one.
    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The closure, if this is one.
    pub fn as_closure(&self) -> Option<&Closure> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }

    /// The primitive, if this is one.
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Character(c)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<Closure> for Value {
    fn from(c: Closure) -> Self {
        Value::Closure(c)
    }
}

impl From<Primitive> for Value {
    fn from(p: Primitive) -> Self {
        Value::Primitive(p)
    }
}
