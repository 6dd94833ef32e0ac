//! Pattern dispatch.

use std::collections::HashMap;

use super::pattern::{PatternTarget, RewritePattern, TypedRewritePattern};
use crate::error::IrResult;
use crate::graph::Graph;
use crate::pass::Pass;
use crate::refs::NodeRef;

/// An ordered set of rewrite patterns with kind-indexed dispatch.
///
/// For each candidate the untyped patterns are tried first, in registration
/// order. Then the candidate's kind hierarchy is walked most-derived first
/// until a target with registered typed patterns is found, and those are
/// tried in registration order. The first pattern that rewrites wins.
///
/// As a [`Pass`], a list performs one greedy sweep over the live nodes.
pub struct RewritePatternList {
    name: String,
    untyped: Vec<Box<dyn RewritePattern>>,
    typed: Vec<Box<dyn RewritePattern>>,
    index: HashMap<PatternTarget, Vec<usize>>,
}

impl RewritePatternList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            untyped: Vec::new(),
            typed: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a pattern tried on every candidate.
    pub fn add_pattern(&mut self, pattern: impl RewritePattern + 'static) -> &mut Self {
        self.untyped.push(Box::new(pattern));
        self
    }

    /// Add a pattern dispatched by its target kind.
    pub fn add_typed(&mut self, pattern: impl TypedRewritePattern + 'static) -> &mut Self {
        let target = pattern.target();
        self.index.entry(target).or_default().push(self.typed.len());
        self.typed.push(Box::new(pattern));
        self
    }

    pub fn with_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.add_pattern(pattern);
        self
    }

    pub fn with_typed(mut self, pattern: impl TypedRewritePattern + 'static) -> Self {
        self.add_typed(pattern);
        self
    }

    pub fn len(&self) -> usize {
        self.untyped.len() + self.typed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Try the patterns on one candidate. Returns whether one rewrote it.
    ///
    /// Dead candidates never match.
    pub fn apply(&self, graph: &mut Graph, node: NodeRef) -> IrResult<bool> {
        if graph.node(node).is_dead() {
            return Ok(false);
        }

        for pattern in &self.untyped {
            if pattern.match_and_rewrite(graph, node)? {
                tracing::trace!(pattern = pattern.name(), node = %node, "pattern applied");
                return Ok(true);
            }
        }

        let name = graph.op_name(node);
        let Some(candidates) = PatternTarget::hierarchy(name)
            .iter()
            .find_map(|target| self.index.get(target))
        else {
            return Ok(false);
        };
        for &idx in candidates {
            let pattern = &self.typed[idx];
            if pattern.match_and_rewrite(graph, node)? {
                tracing::trace!(pattern = pattern.name(), node = %node, op = %name, "pattern applied");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Pass for RewritePatternList {
    fn name(&self) -> &str {
        &self.name
    }

    /// One sweep over a snapshot of the live nodes, then a dead-node sweep.
    fn run(&self, graph: &mut Graph) -> IrResult<bool> {
        let nodes: Vec<NodeRef> = graph.live_nodes().collect();
        let mut changed = false;
        for node in nodes {
            if !graph.is_live(node) {
                continue;
            }
            graph.set_insertion_point_after(Some(node))?;
            changed |= self.apply(graph, node)?;
        }
        graph.sweep_dead()?;
        graph.set_insertion_point_after(None)?;
        Ok(changed)
    }
}
