//! Lexical environments.
//!
//! An environment maps names to root handles and points at its enclosing
//! scope. Closures capture environments through `Arc`, outside the heap, so
//! the collector does not trace them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use core_types::BindError;
use parking_lot::Mutex;

use crate::handle::Handle;
use crate::heap::Heap;

/// A scope of variable bindings.
#[derive(Default)]
pub struct Environment {
    parent: Option<Arc<Environment>>,
    variables: Mutex<HashMap<String, Handle>>,
}

impl Environment {
    /// An empty top-level scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty scope nested in `parent`.
    pub fn with_parent(parent: Arc<Environment>) -> Self {
        Environment {
            parent: Some(parent),
            variables: Mutex::new(HashMap::new()),
        }
    }

    /// Binds call arguments to formal parameters in a new scope.
    ///
    /// Surplus arguments are collected into a list bound to `rest`; without
    /// a rest parameter they are an error. The rest list is empty (a null
    /// handle) when there is no surplus.
    ///
    /// # Errors
    ///
    /// - [`BindError::InsufficientArguments`] if `args` is shorter than
    ///   `params`
    /// - [`BindError::RedundantArguments`] if `args` is longer and `rest` is
    ///   `None`
    ///
    /// # Examples
    ///
    /// ```
    /// use memory_manager::{Environment, Heap, Value};
    ///
    /// let heap = Heap::new();
    /// let args = vec![
    ///     heap.allocate(Value::Integer(1)),
    ///     heap.allocate(Value::Integer(2)),
    ///     heap.allocate(Value::Integer(3)),
    /// ];
    /// let env = Environment::bind(&heap, &["x"], Some("more"), args, None).unwrap();
    ///
    /// assert_eq!(env.get("x").unwrap().read().as_integer(), Some(1));
    /// let more = env.get("more").unwrap();
    /// assert_eq!(more.first().unwrap().read().as_integer(), Some(2));
    /// ```
    pub fn bind<S: AsRef<str>>(
        heap: &Heap,
        params: &[S],
        rest: Option<&str>,
        args: Vec<Handle>,
        parent: Option<Arc<Environment>>,
    ) -> Result<Environment, BindError> {
        let expected = params.len();
        let got = args.len();
        if got < expected {
            return Err(BindError::InsufficientArguments { expected, got });
        }
        if got > expected && rest.is_none() {
            return Err(BindError::RedundantArguments { expected, got });
        }

        let mut variables = HashMap::with_capacity(expected + 1);
        let mut args = args.into_iter();
        for (param, arg) in params.iter().zip(args.by_ref()) {
            variables.insert(param.as_ref().to_string(), arg);
        }
        if let Some(rest) = rest {
            variables.insert(rest.to_string(), heap.list(args.collect::<Vec<_>>()));
        }

        Ok(Environment {
            parent,
            variables: Mutex::new(variables),
        })
    }

    /// The enclosing scope.
    pub fn parent(&self) -> Option<&Arc<Environment>> {
        self.parent.as_ref()
    }

    /// Binds `name` in this scope, replacing any local binding.
    pub fn define(&self, name: impl Into<String>, value: Handle) {
        let previous = self.variables.lock().insert(name.into(), value);
        drop(previous);
    }

    /// Rebinds the nearest existing `name`.
    ///
    /// # Errors
    ///
    /// [`BindError::Unbound`] if no enclosing scope binds `name`.
    pub fn assign(&self, name: &str, value: Handle) -> Result<(), BindError> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            let previous = {
                let mut variables = env.variables.lock();
                variables
                    .get_mut(name)
                    .map(|slot| std::mem::replace(slot, value.clone()))
            };
            if previous.is_some() {
                return Ok(());
            }
            scope = env.parent.as_deref();
        }
        Err(BindError::Unbound(name.to_string()))
    }

    /// Looks `name` up through the scope chain.
    pub fn get(&self, name: &str) -> Option<Handle> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(handle) = env.variables.lock().get(name) {
                return Some(handle.clone());
            }
            scope = env.parent.as_deref();
        }
        None
    }

    /// True if `name` is bound in this scope, ignoring parents.
    pub fn contains_local(&self, name: &str) -> bool {
        self.variables.lock().contains_key(name)
    }

    /// Number of local bindings.
    pub fn len(&self) -> usize {
        self.variables.lock().len()
    }

    /// True if this scope has no local bindings.
    pub fn is_empty(&self) -> bool {
        self.variables.lock().is_empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.variables.lock().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
