//! Graph fixtures shared by the integration tests.

use plait_dialect::{aten, standard_registry};
use plait_ir::{Attribute, Graph, NodeRef, TypeNotation};

pub fn float(shape: &[u64]) -> TypeNotation {
    TypeNotation::tensor(shape.to_vec(), TypeNotation::scalar("float"))
}

/// `relu(addmm(b, x, t(w)){beta, alpha})`, as a traced linear layer looks.
pub fn linear(
    graph: &mut Graph,
    x: NodeRef,
    w: NodeRef,
    b: NodeRef,
    beta: Attribute,
    alpha: Attribute,
) -> NodeRef {
    let wt = graph
        .builder::<aten::T>()
        .unwrap()
        .operand(w)
        .insert(graph)
        .unwrap();
    let y = graph
        .builder::<aten::Addmm>()
        .unwrap()
        .operands([b, x, wt])
        .attr("beta", beta)
        .attr("alpha", alpha)
        .insert(graph)
        .unwrap();
    graph
        .builder::<aten::Relu>()
        .unwrap()
        .operand(y)
        .insert(graph)
        .unwrap()
}

/// Two stacked linear layers of sizes `input -> hidden -> output`.
pub fn mlp(
    batch: u64,
    [input, hidden, output]: [u64; 3],
    beta: Attribute,
    alpha: Attribute,
) -> Graph {
    let mut graph = Graph::new("mlp", standard_registry().unwrap());
    let x = graph.new_argument(float(&[batch, input])).unwrap();
    let w1 = graph.new_argument(float(&[hidden, input])).unwrap();
    let b1 = graph.new_argument(float(&[hidden])).unwrap();
    let w2 = graph.new_argument(float(&[output, hidden])).unwrap();
    let b2 = graph.new_argument(float(&[output])).unwrap();
    let h = linear(&mut graph, x, w1, b1, beta.clone(), alpha.clone());
    let y = linear(&mut graph, h, w2, b2, beta, alpha);
    graph.add_output(Some(y)).unwrap();
    graph
}
