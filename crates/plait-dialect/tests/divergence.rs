//! The fixpoint driver stops pattern sets that never settle.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::float;
use plait_dialect::{canon, standard_registry};
use plait_ir::{
    Divergence, FnPass, Graph, IrError, IrResult, NodeRef, Pass, PatternRewritePass,
    PatternTarget, Pipeline, RewriteConfig, RewritePattern, RewritePatternList,
    TypedRewritePattern, apply_until_fixpoint,
};

/// `add(a, b)` -> `add(b, a)`, forever.
struct CommuteAdd;

impl RewritePattern for CommuteAdd {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let &[Some(a), Some(b)] = graph.node(node).operands() else {
            return Ok(false);
        };
        graph.set_operand(node, 0, Some(b))?;
        graph.set_operand(node, 1, Some(a))?;
        Ok(true)
    }
}

impl TypedRewritePattern for CommuteAdd {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<canon::Add>()
    }
}

/// `relu(x)` -> `relu(relu(x))`: every rewrite creates two more candidates.
struct DoubleRelu;

impl RewritePattern for DoubleRelu {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let Some(x) = graph.node(node).operand(0) else {
            return Ok(false);
        };
        let inner = canon::relu(graph, x, None)?;
        let outer = canon::relu(graph, inner, None)?;
        graph.replace_all_uses(node, outer)?;
        graph.remove_node(node)?;
        Ok(true)
    }
}

impl TypedRewritePattern for DoubleRelu {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<canon::Relu>()
    }
}

fn add_graph() -> Graph {
    let mut graph = Graph::new("add", standard_registry().unwrap());
    let a = graph.new_argument(float(&[2])).unwrap();
    let b = graph.new_argument(float(&[2])).unwrap();
    let sum = canon::add(&mut graph, a, b, None).unwrap();
    graph.add_output(Some(sum)).unwrap();
    graph
}

#[test]
fn in_place_oscillation_hits_the_bound() {
    let mut graph = add_graph();
    let list = RewritePatternList::new("commute").with_typed(CommuteAdd);
    let config = RewriteConfig {
        divergence_factor: 3,
    };
    let err = apply_until_fixpoint(&mut graph, &list, &config).unwrap_err();
    assert_eq!(
        err,
        IrError::DivergentRewrite(Divergence {
            rewrites: 4,
            bound: 3,
            factor: 3,
            initial_nodes: 1,
        })
    );
    assert_eq!(
        err.to_string(),
        "divergent rewrite: 4 rewrites exceeded the bound of 3 (factor 3 over 1 initial nodes)"
    );
    // The driver's recorder is gone and the graph is usable again.
    assert_eq!(graph.listener_count(), 0);
    assert!(!graph.is_locked());
    graph.infer_types().unwrap();
}

#[test]
fn growing_pattern_set_is_bounded() {
    let mut graph = Graph::new("relu", standard_registry().unwrap());
    let x = graph.new_argument(float(&[3])).unwrap();
    let r = canon::relu(&mut graph, x, None).unwrap();
    let s = canon::relu(&mut graph, r, None).unwrap();
    graph.add_output(Some(s)).unwrap();

    let list = RewritePatternList::new("grow").with_typed(DoubleRelu);
    let err = apply_until_fixpoint(&mut graph, &list, &RewriteConfig::default()).unwrap_err();
    let divergence = match err {
        IrError::DivergentRewrite(divergence) => divergence,
        other => panic!("expected divergence, got {other}"),
    };
    assert_eq!(divergence.bound, 20);
    assert_eq!(divergence.rewrites, 21);
    // Each rewrite adds two nodes; the graph cannot have outgrown the bound.
    assert!(graph.sequence().len() <= 2 + 2 * 21);
}

#[test]
fn divergence_aborts_the_pipeline() {
    let mut graph = add_graph();
    let ran = Rc::new(Cell::new(false));
    let ran_after = ran.clone();
    let pipeline = Pipeline::new("p")
        .with_step(PatternRewritePass::new(
            RewritePatternList::new("commute").with_typed(CommuteAdd),
        ))
        .with_step(FnPass::new("after", move |_: &mut Graph| {
            ran_after.set(true);
            Ok(false)
        }));
    let err = pipeline.run(&mut graph).unwrap_err();
    assert!(err.is_divergent());
    assert!(!ran.get());
}

#[test]
fn non_divergent_failures_are_not_divergence() {
    let mut graph = add_graph();
    let a = graph.arguments()[0];
    let err = graph.remove_node(a).unwrap_err();
    assert!(!err.is_divergent());
}
