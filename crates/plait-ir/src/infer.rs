//! Context handed to type inference rules.

use crate::attribute::{Attribute, Attrs};
use crate::error::TypeError;
use crate::registry::OpName;
use crate::types::{TypeNotation, broadcast_shape};

/// Resolved operand types and attributes of the node being inferred.
///
/// Absent operands show up as [`TypeNotation::None`].
pub struct InferCx<'a> {
    op: OpName,
    operands: &'a [TypeNotation],
    attrs: &'a Attrs,
}

impl<'a> InferCx<'a> {
    pub fn new(op: OpName, operands: &'a [TypeNotation], attrs: &'a Attrs) -> Self {
        Self {
            op,
            operands,
            attrs,
        }
    }

    pub fn op(&self) -> OpName {
        self.op
    }

    pub fn operands(&self) -> &'a [TypeNotation] {
        self.operands
    }

    /// All operand types, checking there are exactly `count` of them.
    pub fn expect_operands(&self, count: usize) -> Result<&'a [TypeNotation], TypeError> {
        if self.operands.len() != count {
            return Err(TypeError::OperandCount {
                op: self.op,
                expected: count,
                found: self.operands.len(),
            });
        }
        Ok(self.operands)
    }

    pub fn operand(&self, index: usize) -> Result<&'a TypeNotation, TypeError> {
        self.operands.get(index).ok_or(TypeError::OperandCount {
            op: self.op,
            expected: index + 1,
            found: self.operands.len(),
        })
    }

    /// Shape and element type of a tensor operand.
    pub fn tensor(&self, index: usize) -> Result<(&'a [u64], &'a TypeNotation), TypeError> {
        let ty = self.operand(index)?;
        ty.as_tensor().ok_or_else(|| self.kind_error(index, "a tensor"))
    }

    /// Error for an operand of the wrong kind.
    pub fn kind_error(&self, index: usize, expected: &'static str) -> TypeError {
        TypeError::OperandKind {
            op: self.op,
            index,
            expected,
            found: self
                .operands
                .get(index)
                .cloned()
                .unwrap_or(TypeNotation::None),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&'a Attribute> {
        self.attrs.get(key)
    }

    pub fn int_attr(&self, key: &str) -> Result<i64, TypeError> {
        self.attr(key)
            .and_then(Attribute::as_int)
            .ok_or_else(|| self.missing(key))
    }

    pub fn ints_attr(&self, key: &str) -> Result<Vec<i64>, TypeError> {
        self.attr(key)
            .and_then(Attribute::as_ints)
            .ok_or_else(|| self.missing(key))
    }

    pub fn bool_attr_or(&self, key: &str, default: bool) -> Result<bool, TypeError> {
        match self.attr(key) {
            None => Ok(default),
            Some(attr) => attr.as_bool().ok_or_else(|| self.missing(key)),
        }
    }

    pub fn type_attr(&self, key: &str) -> Result<&'a TypeNotation, TypeError> {
        self.attr(key)
            .and_then(Attribute::as_type)
            .ok_or_else(|| self.missing(key))
    }

    pub fn broadcast(&self, lhs: &[u64], rhs: &[u64]) -> Result<Vec<u64>, TypeError> {
        broadcast_shape(lhs, rhs).map_err(|error| TypeError::Broadcast { op: self.op, error })
    }

    /// Require two element types to agree.
    pub fn same_element(
        &self,
        lhs: &TypeNotation,
        rhs: &TypeNotation,
    ) -> Result<TypeNotation, TypeError> {
        if lhs != rhs {
            return Err(TypeError::ElementMismatch {
                op: self.op,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            });
        }
        Ok(lhs.clone())
    }

    pub fn invalid(&self, message: impl Into<String>) -> TypeError {
        TypeError::Invalid {
            op: self.op,
            message: message.into(),
        }
    }

    fn missing(&self, key: &str) -> TypeError {
        TypeError::MissingAttribute {
            op: self.op,
            key: key.to_owned(),
        }
    }
}
