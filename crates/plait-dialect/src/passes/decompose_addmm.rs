//! Decompose the fused `canon.add_mm` into primitive ops.
//!
//! `add_mm(bias, m1, m2){beta, alpha}` becomes
//! `add(beta * bias, alpha * mat_mul(m1, m2))`. A coefficient equal to 1
//! produces no multiply, and an absent bias leaves only the product term.

use plait_ir::{
    Attribute, Graph, IrResult, NodeRef, PatternRewritePass, PatternTarget, RewriteConfig,
    RewritePattern, RewritePatternList, TypedRewritePattern,
};

use super::replace_node;
use crate::canon;

pub struct DecomposeAddMm;

impl RewritePattern for DecomposeAddMm {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        let data = graph.node(node);
        let &[bias, Some(mat1), Some(mat2)] = data.operands() else {
            return Ok(false);
        };
        let beta = data.attr("beta").cloned().unwrap_or(Attribute::Int(1));
        let alpha = data.attr("alpha").cloned().unwrap_or(Attribute::Int(1));
        let loc = data.location().cloned();

        let bias = match bias {
            Some(bias) if !beta.is_one() => {
                let beta = canon::constant(graph, beta, loc.clone())?;
                Some(canon::mul(graph, beta, bias, loc.clone())?)
            }
            other => other,
        };

        let mut product = canon::mat_mul(graph, mat1, mat2, loc.clone())?;
        if !alpha.is_one() {
            let alpha = canon::constant(graph, alpha, loc.clone())?;
            product = canon::mul(graph, alpha, product, loc.clone())?;
        }

        let result = match bias {
            Some(bias) => canon::add(graph, bias, product, loc)?,
            None => product,
        };
        replace_node(graph, node, result)?;
        Ok(true)
    }
}

impl TypedRewritePattern for DecomposeAddMm {
    fn target(&self) -> PatternTarget {
        PatternTarget::op::<canon::AddMm>()
    }
}

pub fn decompose_addmm_patterns() -> RewritePatternList {
    RewritePatternList::new("decompose-addmm").with_typed(DecomposeAddMm)
}

/// Decompose every `canon.add_mm`, driven to a fixed point.
pub fn decompose_addmm(config: RewriteConfig) -> PatternRewritePass {
    PatternRewritePass::new(decompose_addmm_patterns()).with_config(config)
}
