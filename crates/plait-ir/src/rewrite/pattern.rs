//! Rewrite pattern traits.

use crate::error::IrResult;
use crate::graph::Graph;
use crate::refs::NodeRef;
use crate::registry::{OpKind, OpName};

/// A local rewrite applied to one candidate node.
///
/// On a match the pattern performs the whole rewrite and returns `true`. On
/// no match it returns `false` without having touched the graph; a pattern
/// must never mutate and then report no match.
pub trait RewritePattern {
    fn match_and_rewrite(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool>;

    /// Human-readable name for tracing.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Key of the kind hierarchy used for typed dispatch.
///
/// A node's hierarchy, most-derived first, is its concrete op followed by
/// its dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternTarget {
    Op(OpName),
    Dialect(&'static str),
}

impl PatternTarget {
    pub fn op<K: OpKind>() -> Self {
        PatternTarget::Op(K::op_name())
    }

    /// Hierarchy of a node with qualified name `name`, most-derived first.
    pub fn hierarchy(name: OpName) -> [PatternTarget; 2] {
        [
            PatternTarget::Op(name),
            PatternTarget::Dialect(name.namespace()),
        ]
    }
}

/// A pattern that only applies to one kind, allowing indexed dispatch.
pub trait TypedRewritePattern: RewritePattern {
    fn target(&self) -> PatternTarget;
}
