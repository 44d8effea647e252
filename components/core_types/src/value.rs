//! Value shape tags.

use std::fmt;

/// The shape of a heap value, one tag per variant.
///
/// Used by diagnostics to describe cells without borrowing their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The empty value
    Null,
    /// `#t` / `#f`
    Boolean,
    /// A single character
    Character,
    /// 64-bit signed integer
    Integer,
    /// Double-precision float
    Double,
    /// Owned string
    String,
    /// Symbol name
    Symbol,
    /// Two embedded references
    Pair,
    /// Ordered embedded references
    Vector,
    /// Code plus captured environment
    Closure,
    /// Native function
    Primitive,
}

impl ValueKind {
    /// Lower-case name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Character => "character",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Symbol => "symbol",
            ValueKind::Pair => "pair",
            ValueKind::Vector => "vector",
            ValueKind::Closure => "closure",
            ValueKind::Primitive => "primitive",
        }
    }

    /// True for kinds whose payload embeds references to other cells.
    pub fn is_structural(self) -> bool {
        matches!(self, ValueKind::Pair | ValueKind::Vector)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
