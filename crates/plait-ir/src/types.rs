//! Structural type notation and shape broadcasting.
//!
//! A [`TypeNotation`] describes the result of a node. Types are plain values:
//! they are compared structurally and cloned freely, there is no interner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural type descriptor attached to a node's result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeNotation {
    /// Type not yet computed.
    Unknown,
    /// Absence of a value (absent operands, optional outputs).
    None,
    /// A named scalar kind such as `int`, `float` or `bool`.
    Scalar { name: String },
    /// A dense tensor with a static shape.
    Tensor {
        shape: Vec<u64>,
        element: Box<TypeNotation>,
    },
    /// An ordered product of types.
    Tuple { types: Vec<TypeNotation> },
}

impl TypeNotation {
    pub fn scalar(name: impl Into<String>) -> Self {
        TypeNotation::Scalar { name: name.into() }
    }

    pub fn tensor(shape: impl Into<Vec<u64>>, element: TypeNotation) -> Self {
        TypeNotation::Tensor {
            shape: shape.into(),
            element: Box::new(element),
        }
    }

    pub fn tuple(types: impl IntoIterator<Item = TypeNotation>) -> Self {
        TypeNotation::Tuple {
            types: types.into_iter().collect(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeNotation::Unknown)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TypeNotation::None)
    }

    /// Name of a scalar type, if this is one.
    pub fn scalar_name(&self) -> Option<&str> {
        match self {
            TypeNotation::Scalar { name } => Some(name),
            _ => None,
        }
    }

    /// Shape and element type of a tensor, if this is one.
    pub fn as_tensor(&self) -> Option<(&[u64], &TypeNotation)> {
        match self {
            TypeNotation::Tensor { shape, element } => Some((shape, element)),
            _ => None,
        }
    }

    /// Whether the type is fully computed: not `Unknown`, and no nested tensor
    /// carries an `Unknown` element type.
    pub fn is_resolved(&self) -> bool {
        match self {
            TypeNotation::Unknown => false,
            TypeNotation::None | TypeNotation::Scalar { .. } => true,
            TypeNotation::Tensor { element, .. } => element.is_resolved(),
            TypeNotation::Tuple { types } => types.iter().all(TypeNotation::is_resolved),
        }
    }
}

impl fmt::Display for TypeNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNotation::Unknown => f.write_str("?"),
            TypeNotation::None => f.write_str("none"),
            TypeNotation::Scalar { name } => f.write_str(name),
            TypeNotation::Tensor { shape, element } => {
                write!(f, "tensor({}, {element})", ShapeDisplay(shape))
            }
            TypeNotation::Tuple { types } => {
                f.write_str("tuple(")?;
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Displays a shape as `[4, 5, 3]`.
pub struct ShapeDisplay<'a>(pub &'a [u64]);

impl fmt::Display for ShapeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, extent) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{extent}")?;
        }
        f.write_str("]")
    }
}

// ============================================================================
// Broadcasting
// ============================================================================

/// Two shapes that cannot be broadcast together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastError {
    pub lhs: Vec<u64>,
    pub rhs: Vec<u64>,
    /// Axis of the conflict, counted in the result shape from the left.
    pub axis: usize,
    pub lhs_extent: u64,
    pub rhs_extent: u64,
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot broadcast {} with {}: extents {} and {} conflict at axis {}",
            ShapeDisplay(&self.lhs),
            ShapeDisplay(&self.rhs),
            self.lhs_extent,
            self.rhs_extent,
            self.axis
        )
    }
}

impl std::error::Error for BroadcastError {}

/// Broadcast two shapes using trailing-dimension alignment.
///
/// Shapes are aligned on their right ends; a missing leading dimension counts
/// as extent 1, an extent of 1 stretches to the other extent, and any other
/// mismatch is an error. The result is produced left to right.
pub fn broadcast_shape(lhs: &[u64], rhs: &[u64]) -> Result<Vec<u64>, BroadcastError> {
    let rank = lhs.len().max(rhs.len());
    let extent_at = |shape: &[u64], axis: usize| {
        let pad = rank - shape.len();
        if axis < pad { 1 } else { shape[axis - pad] }
    };

    let mut out = Vec::with_capacity(rank);
    for axis in 0..rank {
        let l = extent_at(lhs, axis);
        let r = extent_at(rhs, axis);
        let extent = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            (l, r) => {
                return Err(BroadcastError {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                    axis,
                    lhs_extent: l,
                    rhs_extent: r,
                });
            }
        };
        out.push(extent);
    }
    Ok(out)
}
