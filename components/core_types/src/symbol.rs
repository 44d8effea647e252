//! Symbol names.

use std::fmt;

/// A symbol, identified by its name.
///
/// Symbols compare by name. They own no heap references, so a heap cell
/// holding one is a leaf for the collector.
///
/// # Examples
///
/// ```
/// use core_types::Symbol;
///
/// let a = Symbol::new("define");
/// let b = Symbol::from("define");
/// assert_eq!(a, b);
/// assert_eq!(a.name(), "define");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: String,
}

impl Symbol {
    /// Creates a symbol with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Symbol { name: name.into() }
    }

    /// The symbol's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol::new(name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
