//! Lower `aten` ops to their `canon` counterparts.
//!
//! Most ops translate one-to-one, keeping operands and attributes. Two need
//! more care:
//!
//! - `aten.add(a, b){alpha}` becomes `canon.add(a, canon.mul(alpha, b))`, or
//!   a plain `canon.add` when `alpha` is 1.
//! - `aten.t(x)` becomes `canon.transpose(x){[1, 0]}` for a matrix and
//!   disappears entirely for vectors and scalars.

use std::marker::PhantomData;

use plait_ir::{
    Attribute, Graph, IrResult, NodeRef, OpKind, PatternRewritePass, PatternTarget, RewriteConfig,
    RewritePattern, RewritePatternList, TypedRewritePattern,
};

use super::replace_node;
use crate::{aten, canon};

/// Re-create a node as kind `D` with the same operands, attributes and
/// location.
pub struct Rename<S, D> {
    _kinds: PhantomData<fn() -> (S, D)>,
}

impl<S: OpKind, D: OpKind> Rename<S, D> {
    pub fn new() -> Self {
        Self {
            _kinds: PhantomData,
        }
    }
}

impl<S: OpKind, D: OpKind> Default for Rename<S, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: OpKind, D: OpKind> RewritePattern for Rename<S, D> {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let data = graph.node(node);
        let operands = data.operands().to_vec();
        let attrs = data.attrs().clone();
        let location = data.location().cloned();

        let mut builder = graph.builder::<D>()?.location(location);
        for operand in operands {
            builder = builder.optional_operand(operand);
        }
        for (key, value) in attrs {
            builder = builder.attr(key, value);
        }
        let new = builder.insert(graph)?;
        replace_node(graph, node, new)?;
        Ok(true)
    }
}

impl<S: OpKind, D: OpKind> TypedRewritePattern for Rename<S, D> {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<S>()
    }
}

/// `aten.add(a, b){alpha}` -> `canon.add(a, alpha * b)`.
pub struct ConvertAdd;

impl RewritePattern for ConvertAdd {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let data = graph.node(node);
        let &[Some(lhs), Some(rhs)] = data.operands() else {
            return Ok(false);
        };
        let alpha = data.attr("alpha").cloned().unwrap_or(Attribute::Int(1));
        let location = data.location().cloned();

        let rhs = if alpha.is_one() {
            rhs
        } else {
            let alpha = canon::constant(graph, alpha, location.clone())?;
            canon::mul(graph, alpha, rhs, location.clone())?
        };
        let new = canon::add(graph, lhs, rhs, location)?;
        replace_node(graph, node, new)?;
        Ok(true)
    }
}

impl TypedRewritePattern for ConvertAdd {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<aten::Add>()
    }
}

/// `aten.t(x)` -> `canon.transpose(x){[1, 0]}`, or `x` below rank 2.
pub struct ConvertT;

impl RewritePattern for ConvertT {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let Some(x) = graph.node(node).operand(0) else {
            return Ok(false);
        };
        // Validates the rank before anything is touched.
        graph.get_type(node)?;
        let rank = graph
            .get_type(x)?
            .as_tensor()
            .map_or(0, |(shape, _)| shape.len());
        let location = graph.node(node).location().cloned();

        let new = if rank == 2 {
            canon::transpose(graph, x, &[1, 0], location)?
        } else {
            tracing::trace!(node = %node, rank, "dropping transpose of a non-matrix");
            x
        };
        replace_node(graph, node, new)?;
        Ok(true)
    }
}

impl TypedRewritePattern for ConvertT {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<aten::T>()
    }
}

/// Patterns lowering every `aten` op.
pub fn aten_to_canon_patterns() -> RewritePatternList {
    RewritePatternList::new("aten-to-canon")
        .with_typed(Rename::<aten::Addmm, canon::AddMm>::new())
        .with_typed(Rename::<aten::Mm, canon::MatMul>::new())
        .with_typed(Rename::<aten::Relu, canon::Relu>::new())
        .with_typed(Rename::<aten::Sum, canon::Sum>::new())
        .with_typed(ConvertAdd)
        .with_typed(ConvertT)
}

/// Lower `aten` to `canon`, driven to a fixed point.
pub fn aten_to_canon(config: RewriteConfig) -> PatternRewritePass {
    PatternRewritePass::new(aten_to_canon_patterns()).with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard_registry;
    use insta::assert_snapshot;
    use plait_ir::{Pass, TypeNotation, print_graph};

    fn float(shape: &[u64]) -> TypeNotation {
        TypeNotation::tensor(shape.to_vec(), TypeNotation::scalar("float"))
    }

    #[test]
    fn lowers_a_linear_layer() {
        let mut graph = Graph::new("linear", standard_registry().unwrap());
        let x = graph.new_argument(float(&[2, 3])).unwrap();
        let w = graph.new_argument(float(&[4, 3])).unwrap();
        let b = graph.new_argument(float(&[4])).unwrap();
        let wt = graph
            .builder::<aten::T>()
            .unwrap()
            .operand(w)
            .insert(&mut graph)
            .unwrap();
        let y = graph
            .builder::<aten::Addmm>()
            .unwrap()
            .operands([b, x, wt])
            .attr("beta", 1i64)
            .attr("alpha", 1i64)
            .insert(&mut graph)
            .unwrap();
        let r = graph
            .builder::<aten::Relu>()
            .unwrap()
            .operand(y)
            .insert(&mut graph)
            .unwrap();
        graph.add_output(Some(r)).unwrap();
        let before = graph.infer_types().unwrap();

        assert!(aten_to_canon(RewriteConfig::default()).run(&mut graph).unwrap());
        assert_eq!(graph.infer_types().unwrap(), before);
        assert_snapshot!(print_graph(&graph, false), @r"
        graph linear(arg0: tensor([2, 3], float), arg1: tensor([4, 3], float), arg2: tensor([4], float)) {
          v0 = canon.transpose(arg1) {permutation = [1, 0]}
          v1 = canon.add_mm(arg2, arg0, v0) {alpha = 1, beta = 1}
          v2 = canon.relu(v1)
          output(v2)
        }
        ");
    }

    #[test]
    fn add_with_alpha_scales_rhs() {
        let mut graph = Graph::new("add", standard_registry().unwrap());
        let a = graph.new_argument(float(&[3])).unwrap();
        let b = graph.new_argument(float(&[3])).unwrap();
        let sum = graph
            .builder::<aten::Add>()
            .unwrap()
            .operands([a, b])
            .attr("alpha", 2i64)
            .insert(&mut graph)
            .unwrap();
        graph.add_output(Some(sum)).unwrap();

        aten_to_canon(RewriteConfig::default()).run(&mut graph).unwrap();
        assert_snapshot!(graph.to_string(), @r"
        graph add(arg0: tensor([3], float), arg1: tensor([3], float)) {
          v0 = canon.constant() {value = 2}
          v1 = canon.mul(v0, arg1)
          v2 = canon.add(arg0, v1)
          output(v2)
        }
        ");
        assert_eq!(graph.infer_types().unwrap(), float(&[3]));
    }

    #[test]
    fn transpose_of_a_vector_vanishes() {
        let mut graph = Graph::new("t", standard_registry().unwrap());
        let v = graph.new_argument(float(&[5])).unwrap();
        let t = graph
            .builder::<aten::T>()
            .unwrap()
            .operand(v)
            .insert(&mut graph)
            .unwrap();
        let r = graph
            .builder::<aten::Relu>()
            .unwrap()
            .operand(t)
            .insert(&mut graph)
            .unwrap();
        graph.add_output(Some(t)).unwrap();
        graph.add_output(Some(r)).unwrap();

        aten_to_canon(RewriteConfig::default()).run(&mut graph).unwrap();
        assert_snapshot!(graph.to_string(), @r"
        graph t(arg0: tensor([5], float)) {
          v0 = canon.relu(arg0)
          output(arg0, v0)
        }
        ");
    }

    #[test]
    fn canon_nodes_are_left_alone() {
        let mut graph = Graph::new("canon", standard_registry().unwrap());
        let x = graph.new_argument(float(&[2])).unwrap();
        let r = canon::relu(&mut graph, x, None).unwrap();
        graph.add_output(Some(r)).unwrap();
        assert!(!aten_to_canon(RewriteConfig::default()).run(&mut graph).unwrap());
    }
}
