//! A small dialect for exercising the core in unit tests.

use std::sync::Arc;

use crate::error::{ConfigError, IrResult, TypeError};
use crate::graph::Graph;
use crate::infer::InferCx;
use crate::refs::NodeRef;
use crate::registry::{Arity, Dialect, DialectRegistry, OpKind, RegistryBuilder};
use crate::rewrite::{PatternTarget, RewritePattern, TypedRewritePattern};
use crate::types::TypeNotation;

pub fn float_tensor(shape: &[u64]) -> TypeNotation {
    TypeNotation::tensor(shape.to_vec(), TypeNotation::scalar("float"))
}

pub fn test_registry() -> Arc<DialectRegistry> {
    let mut builder = DialectRegistry::builder();
    builder.register_dialect::<TestDialect>().unwrap();
    builder.build()
}

/// Broadcast every operand together; element types must agree.
fn elementwise(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
    let (shape, element) = cx.tensor(0)?;
    let mut shape = shape.to_vec();
    for index in 1..cx.operands().len() {
        let (other, other_element) = cx.tensor(index)?;
        cx.same_element(element, other_element)?;
        shape = cx.broadcast(&shape, other)?;
    }
    Ok(TypeNotation::tensor(shape, element.clone()))
}

macro_rules! test_op {
    ($ty:ident, $name:literal, $arity:expr) => {
        pub struct $ty;

        impl OpKind for $ty {
            const NAMESPACE: &'static str = "test";
            const NAME: &'static str = $name;
            const ARITY: Arity = $arity;

            fn infer_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
                elementwise(cx)
            }
        }
    };
}

test_op!(TestAdd, "add", Arity::Fixed(2));
test_op!(TestMul, "mul", Arity::Fixed(2));
test_op!(TestNeg, "neg", Arity::Fixed(1));
test_op!(TestFma, "fma", Arity::Fixed(3));
test_op!(TestPing, "ping", Arity::Fixed(1));
test_op!(TestPong, "pong", Arity::Fixed(1));

pub struct TestDialect;

impl Dialect for TestDialect {
    const NAMESPACE: &'static str = "test";

    fn register(builder: &mut RegistryBuilder) -> Result<(), ConfigError> {
        builder
            .register::<TestAdd>()?
            .register::<TestMul>()?
            .register::<TestNeg>()?
            .register::<TestFma>()?
            .register::<TestPing>()?
            .register::<TestPong>()?;
        Ok(())
    }
}

/// `fma(a, b, c)` -> `add(mul(a, b), c)`.
pub struct DecomposeFma;

impl RewritePattern for DecomposeFma {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let &[Some(a), Some(b), Some(c)] = graph.node(node).operands() else {
            return Ok(false);
        };
        let mul = graph
            .builder::<TestMul>()?
            .operands([a, b])
            .insert(graph)?;
        let add = graph
            .builder::<TestAdd>()?
            .operands([mul, c])
            .insert(graph)?;
        graph.replace_all_uses(node, add)?;
        graph.remove_node(node)?;
        Ok(true)
    }
}

impl TypedRewritePattern for DecomposeFma {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<TestFma>()
    }
}

/// Replace a one-operand node with an `O` over the same operand.
fn swap_kind<O: OpKind>(graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
    let Some(x) = graph.node(node).operand(0) else {
        return Ok(false);
    };
    let new = graph.builder::<O>()?.operand(x).insert(graph)?;
    graph.replace_all_uses(node, new)?;
    graph.remove_node(node)?;
    Ok(true)
}

pub struct PingToPong;

impl RewritePattern for PingToPong {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        swap_kind::<TestPong>(graph, node)
    }
}

impl TypedRewritePattern for PingToPong {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<TestPing>()
    }
}

pub struct PongToPing;

impl RewritePattern for PongToPing {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        swap_kind::<TestPing>(graph, node)
    }
}

impl TypedRewritePattern for PongToPing {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<TestPong>()
    }
}
