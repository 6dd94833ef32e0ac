//! `aten` dialect: framework-level ops as they arrive from a traced program.
//!
//! Every op has a foreign factory keyed by the framework's operation
//! identifier (`aten::addmm`, ...). Factories read positional arguments first
//! and fall back to keyword attributes, then to the framework defaults.

use plait_ir::{
    Arity, Attribute, ConfigError, Dialect, ForeignOp, Graph, InferCx, IrResult, NodeRef,
    RegistryBuilder, TypeError, TypeNotation,
};

use crate::rules;
use crate::{int_list, ops};

ops! {
    "aten";

    /// `aten.addmm`: `beta * bias + alpha * (mat1 @ mat2)` over matrices.
    Addmm = "addmm", Arity::Fixed(3), addmm_type;

    /// `aten.mm`: product of two matrices.
    Mm = "mm", Arity::Fixed(2), mm_type;

    /// `aten.t`: transposes a matrix; lower ranks pass through unchanged.
    T = "t", Arity::Fixed(1), t_type;

    /// `aten.relu`
    Relu = "relu", Arity::Fixed(1), tensor_unary;

    /// `aten.add`: `lhs + alpha * rhs`.
    Add = "add", Arity::Fixed(2), rules::binary;

    /// `aten.sum`: reduction over `dims`.
    Sum = "sum", Arity::Fixed(1), rules::sum;
}

fn require_matrix(cx: &InferCx<'_>, index: usize) -> Result<(), TypeError> {
    let (shape, _) = cx.tensor(index)?;
    if shape.len() != 2 {
        return Err(cx.invalid(format!(
            "operand {index} must be a matrix, got rank {}",
            shape.len()
        )));
    }
    Ok(())
}

fn mm_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(2)?;
    require_matrix(cx, 0)?;
    require_matrix(cx, 1)?;
    rules::mat_mul(cx, 0, 1)
}

fn addmm_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(3)?;
    require_matrix(cx, 1)?;
    require_matrix(cx, 2)?;
    rules::add_mm(cx)
}

fn t_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(1)?;
    let (shape, element) = cx.tensor(0)?;
    match *shape {
        [rows, cols] => Ok(TypeNotation::tensor(vec![cols, rows], element.clone())),
        [] | [_] => Ok(cx.operands()[0].clone()),
        _ => Err(cx.invalid(format!(
            "expects a tensor of rank at most 2, got rank {}",
            shape.len()
        ))),
    }
}

fn tensor_unary(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    cx.expect_operands(1)?;
    cx.tensor(0)?;
    Ok(cx.operands()[0].clone())
}

pub struct Aten;

impl Dialect for Aten {
    const NAMESPACE: &'static str = "aten";

    fn register(builder: &mut RegistryBuilder) -> Result<(), ConfigError> {
        builder
            .register::<Addmm>()?
            .register::<Mm>()?
            .register::<T>()?
            .register::<Relu>()?
            .register::<Add>()?
            .register::<Sum>()?;
        builder
            .register_foreign("aten::addmm", addmm_from_foreign)?
            .register_foreign("aten::mm", mm_from_foreign)?
            .register_foreign("aten::t", t_from_foreign)?
            .register_foreign("aten::relu", relu_from_foreign)?
            .register_foreign("aten::add.Tensor", add_from_foreign)?
            .register_foreign("aten::sum.dim_IntList", sum_from_foreign)?;
        Ok(())
    }
}

// ============================================================================
// Foreign factories
// ============================================================================

/// A numeric scalar parameter such as `beta` or `alpha`, defaulting to 1.
fn coefficient(op: &ForeignOp<'_>, index: usize, key: &str) -> IrResult<Attribute> {
    match op.param(index, key) {
        None => Ok(Attribute::Int(1)),
        Some(attr) if attr.as_f64().is_some() => Ok(attr.clone()),
        Some(attr) => Err(op.invalid(format!("`{key}` must be a number, got {attr}")).into()),
    }
}

fn addmm_from_foreign(graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
    let bias = op.optional_node(0)?;
    let (mat1, mat2) = (op.node(1)?, op.node(2)?);
    graph
        .builder::<Addmm>()?
        .optional_operand(bias)
        .operands([mat1, mat2])
        .attr("beta", coefficient(op, 3, "beta")?)
        .attr("alpha", coefficient(op, 4, "alpha")?)
        .location(op.location.clone())
        .build(graph)
}

fn mm_from_foreign(graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
    let (lhs, rhs) = (op.node(0)?, op.node(1)?);
    graph
        .builder::<Mm>()?
        .operands([lhs, rhs])
        .location(op.location.clone())
        .build(graph)
}

fn t_from_foreign(graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
    let x = op.node(0)?;
    graph
        .builder::<T>()?
        .operand(x)
        .location(op.location.clone())
        .build(graph)
}

fn relu_from_foreign(graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
    let x = op.node(0)?;
    graph
        .builder::<Relu>()?
        .operand(x)
        .location(op.location.clone())
        .build(graph)
}

fn add_from_foreign(graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
    let (lhs, rhs) = (op.node(0)?, op.node(1)?);
    graph
        .builder::<Add>()?
        .operands([lhs, rhs])
        .attr("alpha", coefficient(op, 2, "alpha")?)
        .location(op.location.clone())
        .build(graph)
}

fn sum_from_foreign(graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
    let x = op.node(0)?;
    let dims = match op.param(1, "dim") {
        Some(attr) => attr
            .as_ints()
            .ok_or_else(|| op.invalid(format!("`dim` must be a list of integers, got {attr}")))?,
        None => return Err(op.invalid("missing `dim`").into()),
    };
    let keepdim = match op.param(2, "keepdim") {
        None => false,
        Some(attr) => attr
            .as_bool()
            .ok_or_else(|| op.invalid(format!("`keepdim` must be a boolean, got {attr}")))?,
    };
    graph
        .builder::<Sum>()?
        .operand(x)
        .attr("dims", int_list(&dims))
        .attr("keepdim", keepdim)
        .location(op.location.clone())
        .build(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard_registry;
    use plait_ir::{Attrs, ForeignArg, IrError, Location, StructuralError};

    fn float(shape: &[u64]) -> TypeNotation {
        TypeNotation::tensor(shape.to_vec(), TypeNotation::scalar("float"))
    }

    fn import(graph: &mut Graph, id: &str, args: &[ForeignArg], attrs: &Attrs) -> IrResult<NodeRef> {
        let factory = graph.registry().foreign(id)?;
        let op = ForeignOp {
            id,
            args,
            attrs,
            location: Some(Location::named("probe")),
        };
        let node = factory(graph, &op)?;
        graph.add_node(node)
    }

    #[test]
    fn addmm_defaults_and_keywords() {
        let mut graph = Graph::new("addmm", standard_registry().unwrap());
        let b = graph.new_argument(float(&[4])).unwrap();
        let x = graph.new_argument(float(&[2, 3])).unwrap();
        let w = graph.new_argument(float(&[3, 4])).unwrap();

        let mut attrs = Attrs::new();
        attrs.insert("alpha".to_owned(), Attribute::Float(0.5));
        let args = [ForeignArg::Node(b), ForeignArg::Node(x), ForeignArg::Node(w)];
        let node = import(&mut graph, "aten::addmm", &args, &attrs).unwrap();

        let data = graph.node(node);
        assert!(graph.is::<Addmm>(node));
        assert_eq!(data.attr("beta"), Some(&Attribute::Int(1)));
        assert_eq!(data.attr("alpha"), Some(&Attribute::Float(0.5)));
        assert_eq!(data.location(), Some(&Location::named("probe")));
        assert_eq!(graph.get_type(node).unwrap(), float(&[2, 4]));
    }

    #[test]
    fn addmm_without_bias() {
        let mut graph = Graph::new("addmm", standard_registry().unwrap());
        let x = graph.new_argument(float(&[2, 3])).unwrap();
        let w = graph.new_argument(float(&[3, 4])).unwrap();
        let args = [
            ForeignArg::Absent,
            ForeignArg::Node(x),
            ForeignArg::Node(w),
            ForeignArg::Literal(Attribute::Int(2)),
        ];
        let node = import(&mut graph, "aten::addmm", &args, &Attrs::new()).unwrap();
        assert_eq!(graph.node(node).operand(0), None);
        assert_eq!(graph.node(node).attr("beta"), Some(&Attribute::Int(2)));
        assert_eq!(graph.get_type(node).unwrap(), float(&[2, 4]));
    }

    #[test]
    fn non_numeric_coefficient_is_rejected() {
        let mut graph = Graph::new("add", standard_registry().unwrap());
        let x = graph.new_argument(float(&[2])).unwrap();
        let args = [
            ForeignArg::Node(x),
            ForeignArg::Node(x),
            ForeignArg::Literal(Attribute::from("two")),
        ];
        let err = import(&mut graph, "aten::add.Tensor", &args, &Attrs::new()).unwrap_err();
        assert!(matches!(
            err,
            IrError::Structural(StructuralError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn sum_reads_dims_and_keepdim() {
        let mut graph = Graph::new("sum", standard_registry().unwrap());
        let x = graph.new_argument(float(&[2, 3])).unwrap();
        let args = [
            ForeignArg::Node(x),
            ForeignArg::Literal(Attribute::List(vec![Attribute::Int(0)])),
        ];
        let mut attrs = Attrs::new();
        attrs.insert("keepdim".to_owned(), Attribute::Bool(true));
        let node = import(&mut graph, "aten::sum.dim_IntList", &args, &attrs).unwrap();
        assert_eq!(graph.get_type(node).unwrap(), float(&[1, 3]));

        let err = import(&mut graph, "aten::sum.dim_IntList", &args[..1], &Attrs::new());
        assert!(err.is_err());
    }

    #[test]
    fn t_passes_low_ranks_through() {
        let mut graph = Graph::new("t", standard_registry().unwrap());
        let v = graph.new_argument(float(&[5])).unwrap();
        let m = graph.new_argument(float(&[2, 5])).unwrap();
        let c = graph.new_argument(float(&[2, 5, 1])).unwrap();
        let tv = import(&mut graph, "aten::t", &[ForeignArg::Node(v)], &Attrs::new()).unwrap();
        let tm = import(&mut graph, "aten::t", &[ForeignArg::Node(m)], &Attrs::new()).unwrap();
        let tc = import(&mut graph, "aten::t", &[ForeignArg::Node(c)], &Attrs::new()).unwrap();
        assert_eq!(graph.get_type(tv).unwrap(), float(&[5]));
        assert_eq!(graph.get_type(tm).unwrap(), float(&[5, 2]));
        assert!(graph.get_type(tc).is_err());
    }

    #[test]
    fn mm_requires_matrices() {
        let mut graph = Graph::new("mm", standard_registry().unwrap());
        let a = graph.new_argument(float(&[2, 2, 3])).unwrap();
        let b = graph.new_argument(float(&[3, 4])).unwrap();
        let args = [ForeignArg::Node(a), ForeignArg::Node(b)];
        let node = import(&mut graph, "aten::mm", &args, &Attrs::new()).unwrap();
        assert!(matches!(
            graph.get_type(node),
            Err(IrError::Type(TypeError::Invalid { .. }))
        ));
    }

    #[test]
    fn literal_where_value_expected() {
        let mut graph = Graph::new("relu", standard_registry().unwrap());
        let args = [ForeignArg::Literal(Attribute::Int(3))];
        assert!(import(&mut graph, "aten::relu", &args, &Attrs::new()).is_err());
        assert!(matches!(
            import(&mut graph, "aten::gelu", &args, &Attrs::new()),
            Err(IrError::Config(ConfigError::UnknownForeignOp(_)))
        ));
    }
}
