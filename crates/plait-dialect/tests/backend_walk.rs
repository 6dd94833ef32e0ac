//! A toy backend: evaluate a canonical graph numerically through a locked
//! walk and compare it with the fused formula it was lowered from.

mod common;

use std::collections::HashMap;

use common::mlp;
use plait_dialect::{canon, canonicalize};
use plait_ir::{
    Attribute, Graph, IrError, IrResult, NodeRef, Pass, RewriteConfig, StructuralError,
};

#[derive(Clone, Debug, PartialEq)]
struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Deterministic contents derived from `seed`.
    fn filled(shape: &[usize], seed: usize) -> Self {
        let len: usize = shape.iter().product();
        let data = (0..len)
            .map(|i| ((i * 7 + seed * 13) % 11) as f64 - 5.0)
            .collect();
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    fn zip(&self, other: &Tensor, f: impl Fn(f64, f64) -> f64) -> Self {
        let rank = self.shape.len().max(other.shape.len());
        let pad = |shape: &[usize]| {
            let mut padded = vec![1; rank - shape.len()];
            padded.extend_from_slice(shape);
            padded
        };
        let (lhs, rhs) = (pad(&self.shape), pad(&other.shape));
        let shape: Vec<usize> = lhs.iter().zip(&rhs).map(|(&a, &b)| a.max(b)).collect();
        let len: usize = shape.iter().product();
        let data = (0..len)
            .map(|flat| {
                let (mut rest, mut li, mut ri, mut ls, mut rs) = (flat, 0, 0, 1, 1);
                for d in (0..rank).rev() {
                    let idx = rest % shape[d];
                    rest /= shape[d];
                    if lhs[d] != 1 {
                        li += idx * ls;
                    }
                    if rhs[d] != 1 {
                        ri += idx * rs;
                    }
                    ls *= lhs[d];
                    rs *= rhs[d];
                }
                f(self.data[li], other.data[ri])
            })
            .collect();
        Self { shape, data }
    }

    fn mat_mul(&self, other: &Tensor) -> Self {
        let (&[m, k], &[k2, n]) = (&self.shape[..], &other.shape[..]) else {
            panic!("toy backend only multiplies matrices");
        };
        assert_eq!(k, k2);
        let mut data = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                data[i * n + j] = (0..k)
                    .map(|p| self.data[i * k + p] * other.data[p * n + j])
                    .sum();
            }
        }
        Self {
            shape: vec![m, n],
            data,
        }
    }

    fn transpose(&self) -> Self {
        let &[rows, cols] = &self.shape[..] else {
            panic!("toy backend only transposes matrices");
        };
        let mut data = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = self.data[i * cols + j];
            }
        }
        Self {
            shape: vec![cols, rows],
            data,
        }
    }

    fn approx_eq(&self, other: &Tensor) -> bool {
        self.shape == other.shape
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() < 1e-9)
    }
}

/// Evaluate the graph's single output for the given argument values.
fn evaluate(graph: &mut Graph, inputs: &[Tensor]) -> IrResult<Tensor> {
    let mut values: HashMap<NodeRef, Tensor> = graph
        .arguments()
        .iter()
        .copied()
        .zip(inputs.iter().cloned())
        .collect();

    graph.walk(|graph, node| {
        let data = graph.node(node);
        let args: Vec<&Tensor> = data
            .operands()
            .iter()
            .map(|operand| &values[&operand.expect("operand present")])
            .collect();
        let arg = |i: usize| args[i];
        let value = if graph.is::<canon::Constant>(node) {
            let literal = data.attr("value").and_then(Attribute::as_f64);
            Tensor::scalar(literal.expect("numeric constant"))
        } else if graph.is::<canon::Add>(node) {
            arg(0).zip(arg(1), |a, b| a + b)
        } else if graph.is::<canon::Mul>(node) {
            arg(0).zip(arg(1), |a, b| a * b)
        } else if graph.is::<canon::MatMul>(node) {
            arg(0).mat_mul(arg(1))
        } else if graph.is::<canon::Transpose>(node) {
            arg(0).transpose()
        } else if graph.is::<canon::Relu>(node) {
            arg(0).map(|x| x.max(0.0))
        } else {
            panic!("toy backend cannot run {}", graph.op_name(node));
        };
        values.insert(node, value);
        Ok(())
    })?;

    let output = graph.outputs()[0].expect("graph has an output");
    Ok(values.remove(&output).expect("output was evaluated"))
}

/// `relu(beta * b + alpha * (x @ w^T))`, computed without the graph.
fn linear(x: &Tensor, w: &Tensor, b: &Tensor, beta: f64, alpha: f64) -> Tensor {
    let product = x.mat_mul(&w.transpose()).map(|v| v * alpha);
    b.map(|v| v * beta)
        .zip(&product, |l, r| l + r)
        .map(|v| v.max(0.0))
}

#[test]
fn decomposed_mlp_computes_the_fused_formula() {
    for (beta, alpha) in [(1.0, 1.0), (2.0, 0.5), (0.5, 3.0)] {
        let mut graph = mlp(3, [4, 5, 2], Attribute::Float(beta), Attribute::Float(alpha));
        canonicalize(RewriteConfig::default())
            .run(&mut graph)
            .unwrap();

        let inputs = [
            Tensor::filled(&[3, 4], 1),
            Tensor::filled(&[5, 4], 2),
            Tensor::filled(&[5], 3),
            Tensor::filled(&[2, 5], 4),
            Tensor::filled(&[2], 5),
        ];
        let got = evaluate(&mut graph, &inputs).unwrap();

        let hidden = linear(&inputs[0], &inputs[1], &inputs[2], beta, alpha);
        let expected = linear(&hidden, &inputs[3], &inputs[4], beta, alpha);
        assert!(
            got.approx_eq(&expected),
            "beta={beta} alpha={alpha}: {got:?} != {expected:?}"
        );
    }
}

#[test]
fn backend_cannot_mutate_during_its_walk() {
    let mut graph = mlp(1, [2, 2, 2], Attribute::Int(1), Attribute::Int(1));
    canonicalize(RewriteConfig::default())
        .run(&mut graph)
        .unwrap();
    let before = graph.to_string();

    let err = graph
        .walk(|graph, node| {
            graph.remove_node(node)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(
        err,
        IrError::Structural(StructuralError::GraphLocked("remove a node"))
    );
    assert!(!graph.is_locked());
    assert_eq!(graph.to_string(), before);
}
