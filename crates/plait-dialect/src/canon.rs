//! `canon` dialect: the canonical tensor op set passes lower into.
//!
//! | op | operands | attributes |
//! |----|----------|------------|
//! | `constant` | - | `value`, optional `type` for tensor literals |
//! | `add`, `mul` | lhs, rhs | - |
//! | `mat_mul` | lhs, rhs | - |
//! | `add_mm` | bias?, mat1, mat2 | `beta`, `alpha` |
//! | `transpose` | x | `permutation` |
//! | `relu` | x | - |
//! | `sum` | x | `dims`, `keepdim` |

use plait_ir::{
    Arity, Attribute, ConfigError, Dialect, Graph, InferCx, IrResult, Location, NodeRef,
    RegistryBuilder, TypeError, TypeNotation,
};

use crate::rules;
use crate::{int_list, ops};

ops! {
    "canon";

    /// `canon.constant`: a literal scalar, or a tensor literal with a declared
    /// `type`.
    Constant = "constant", Arity::Fixed(0), constant_type;

    /// `canon.add`: broadcasting elementwise addition.
    Add = "add", Arity::Fixed(2), rules::binary;

    /// `canon.mul`: broadcasting elementwise multiplication.
    Mul = "mul", Arity::Fixed(2), rules::binary;

    /// `canon.mat_mul`: matrix product over the last two dims.
    MatMul = "mat_mul", Arity::Fixed(2), |cx| rules::mat_mul(cx, 0, 1);

    /// `canon.add_mm`: `beta * bias + alpha * (mat1 @ mat2)`.
    AddMm = "add_mm", Arity::Fixed(3), rules::add_mm;

    /// `canon.transpose`: permutes dims.
    Transpose = "transpose", Arity::Fixed(1), rules::transpose;

    /// `canon.relu`: elementwise `max(x, 0)`.
    Relu = "relu", Arity::Fixed(1), rules::unary;

    /// `canon.sum`: reduction over `dims`.
    Sum = "sum", Arity::Fixed(1), rules::sum;
}

fn constant_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    if let Some(ty) = cx.attr("type").and_then(Attribute::as_type) {
        return Ok(ty.clone());
    }
    match cx.attr("value") {
        Some(Attribute::Bool(_)) => Ok(TypeNotation::scalar("bool")),
        Some(Attribute::Int(_)) => Ok(TypeNotation::scalar("int")),
        Some(Attribute::Float(_)) => Ok(TypeNotation::scalar("float")),
        Some(other) => Err(cx.invalid(format!("a literal {other} needs a declared `type`"))),
        None => Err(TypeError::MissingAttribute {
            op: cx.op(),
            key: "value".to_owned(),
        }),
    }
}

pub struct Canon;

impl Dialect for Canon {
    const NAMESPACE: &'static str = "canon";

    fn register(builder: &mut RegistryBuilder) -> Result<(), ConfigError> {
        builder
            .register::<Constant>()?
            .register::<Add>()?
            .register::<Mul>()?
            .register::<MatMul>()?
            .register::<AddMm>()?
            .register::<Transpose>()?
            .register::<Relu>()?
            .register::<Sum>()?;
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================
//
// Each builder inserts at the graph's cursor and returns the new node.

pub fn constant(
    graph: &mut Graph,
    value: impl Into<Attribute>,
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<Constant>()?
        .attr("value", value)
        .location(location)
        .insert(graph)
}

pub fn add(
    graph: &mut Graph,
    lhs: NodeRef,
    rhs: NodeRef,
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<Add>()?
        .operands([lhs, rhs])
        .location(location)
        .insert(graph)
}

pub fn mul(
    graph: &mut Graph,
    lhs: NodeRef,
    rhs: NodeRef,
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<Mul>()?
        .operands([lhs, rhs])
        .location(location)
        .insert(graph)
}

pub fn mat_mul(
    graph: &mut Graph,
    lhs: NodeRef,
    rhs: NodeRef,
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<MatMul>()?
        .operands([lhs, rhs])
        .location(location)
        .insert(graph)
}

pub fn add_mm(
    graph: &mut Graph,
    bias: Option<NodeRef>,
    [mat1, mat2]: [NodeRef; 2],
    beta: Attribute,
    alpha: Attribute,
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<AddMm>()?
        .optional_operand(bias)
        .operands([mat1, mat2])
        .attr("beta", beta)
        .attr("alpha", alpha)
        .location(location)
        .insert(graph)
}

pub fn transpose(
    graph: &mut Graph,
    x: NodeRef,
    permutation: &[i64],
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<Transpose>()?
        .operand(x)
        .attr("permutation", int_list(permutation))
        .location(location)
        .insert(graph)
}

pub fn relu(graph: &mut Graph, x: NodeRef, location: Option<Location>) -> IrResult<NodeRef> {
    graph
        .builder::<Relu>()?
        .operand(x)
        .location(location)
        .insert(graph)
}

pub fn sum(
    graph: &mut Graph,
    x: NodeRef,
    dims: &[i64],
    keepdim: bool,
    location: Option<Location>,
) -> IrResult<NodeRef> {
    graph
        .builder::<Sum>()?
        .operand(x)
        .attr("dims", int_list(dims))
        .attr("keepdim", keepdim)
        .location(location)
        .insert(graph)
}
