//! Node attributes and source locations.

use std::collections::BTreeMap;
use std::fmt;

use derive_more::Display;

use crate::types::{ShapeDisplay, TypeNotation};

/// Attribute bag of a node, ordered by key so printing is deterministic.
pub type Attrs = BTreeMap<String, Attribute>;

/// Immutable literal attached to a node. Never refers to another node.
#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A tensor shape.
    Shape(Vec<u64>),
    /// A declared type (placeholders carry their input type this way).
    Type(TypeNotation),
    /// Nested literal list.
    List(Vec<Attribute>),
}

impl Attribute {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Attribute::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attribute::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value of an `Int` or `Float` attribute.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Attribute::Int(v) => Some(*v as f64),
            Attribute::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeNotation> {
        match self {
            Attribute::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Integer list view of a `Shape` or a `List` of `Int`s.
    pub fn as_ints(&self) -> Option<Vec<i64>> {
        match self {
            Attribute::Shape(shape) => shape.iter().map(|&d| i64::try_from(d).ok()).collect(),
            Attribute::List(items) => items.iter().map(Attribute::as_int).collect(),
            _ => None,
        }
    }

    /// Whether this is the numeric literal one (`1` or `1.0`).
    pub fn is_one(&self) -> bool {
        self.as_f64() == Some(1.0)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Bool(v) => write!(f, "{v}"),
            Attribute::Int(v) => write!(f, "{v}"),
            Attribute::Float(v) => write!(f, "{v:?}"),
            Attribute::String(v) => write!(f, "{v:?}"),
            Attribute::Shape(shape) => write!(f, "{}", ShapeDisplay(shape)),
            Attribute::Type(ty) => write!(f, "{ty}"),
            Attribute::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Bool(value)
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::Int(value)
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Attribute::Float(value)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::String(value.to_owned())
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::String(value)
    }
}

impl From<TypeNotation> for Attribute {
    fn from(value: TypeNotation) -> Self {
        Attribute::Type(value)
    }
}

impl From<Vec<Attribute>> for Attribute {
    fn from(value: Vec<Attribute>) -> Self {
        Attribute::List(value)
    }
}

/// Where a node came from, for diagnostics.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum Location {
    /// A named value in the producing frontend.
    #[display("{_0}")]
    Named(String),
    /// A line in a source file.
    #[display("{file}:{line}")]
    FileLine { file: String, line: u32 },
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Location::Named(name.into())
    }
}
