//! Canonicalization passes over the reference dialects.

mod aten_to_canon;
mod decompose_addmm;

pub use aten_to_canon::{ConvertAdd, ConvertT, Rename, aten_to_canon, aten_to_canon_patterns};
pub use decompose_addmm::{DecomposeAddMm, decompose_addmm, decompose_addmm_patterns};

use plait_ir::{Graph, IrResult, NodeRef, Pipeline, RewriteConfig};

/// Lower `aten` to `canon`, then decompose fused ops.
pub fn canonicalize(config: RewriteConfig) -> Pipeline {
    Pipeline::new("canonicalize")
        .with_step(aten_to_canon(config))
        .with_step(decompose_addmm(config))
}

/// Reroute every use of `old` to `new` and mark `old` dead.
pub(crate) fn replace_node(graph: &mut Graph, old: NodeRef, new: NodeRef) -> IrResult<()> {
    graph.replace_all_uses(old, new)?;
    graph.remove_node(old)
}
