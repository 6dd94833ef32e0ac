//! Worklist-driven fixpoint application of a pattern list.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::list::RewritePatternList;
use crate::error::{Divergence, IrResult};
use crate::graph::Graph;
use crate::listener::{GraphListener, GraphView};
use crate::pass::Pass;
use crate::refs::NodeRef;

/// Configuration for [`apply_until_fixpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// A run may perform at most this many rewrites per initial live node
    /// before it is reported as divergent.
    pub divergence_factor: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            divergence_factor: 10,
        }
    }
}

/// Result of a fixpoint run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Number of worklist sweeps performed.
    pub sweeps: usize,
    /// Total number of successful rewrites.
    pub rewrites: usize,
}

/// Records nodes added or re-wired during a sweep.
struct TouchedNodes(Rc<RefCell<Vec<NodeRef>>>);

impl GraphListener for TouchedNodes {
    fn after_add_node(&mut self, _view: GraphView<'_>, node: NodeRef, _index: usize) {
        self.0.borrow_mut().push(node);
    }

    fn before_operand_change(
        &mut self,
        _view: GraphView<'_>,
        user: NodeRef,
        _index: usize,
        _old: Option<NodeRef>,
        _new: Option<NodeRef>,
    ) {
        self.0.borrow_mut().push(user);
    }
}

/// Apply `patterns` until no candidate matches.
///
/// The worklist starts as every live node. Each sweep visits the live
/// candidates with the cursor placed right after the candidate, so
/// replacements land next to the site they replace. Rewritten candidates,
/// nodes added during the sweep and users whose operands changed form the
/// next worklist. The run fails with [`crate::IrError::DivergentRewrite`]
/// once the rewrite count exceeds `divergence_factor` times the initial live
/// node count.
pub fn apply_until_fixpoint(
    graph: &mut Graph,
    patterns: &RewritePatternList,
    config: &RewriteConfig,
) -> IrResult<RewriteStats> {
    let mut worklist: Vec<NodeRef> = graph.live_nodes().collect();
    let initial_nodes = worklist.len();
    let bound = config.divergence_factor.saturating_mul(initial_nodes.max(1));
    let mut stats = RewriteStats::default();

    while !worklist.is_empty() {
        stats.sweeps += 1;
        tracing::debug!(
            sweep = stats.sweeps,
            worklist = worklist.len(),
            rewrites = stats.rewrites,
            "rewrite sweep"
        );

        let touched = Rc::new(RefCell::new(Vec::new()));
        let candidates = std::mem::take(&mut worklist);
        let rewritten = graph.with_listener(TouchedNodes(touched.clone()), |graph| {
            let mut rewritten = Vec::new();
            for node in candidates {
                if !graph.is_live(node) {
                    continue;
                }
                graph.set_insertion_point_after(Some(node))?;
                if !patterns.apply(graph, node)? {
                    continue;
                }
                stats.rewrites += 1;
                if stats.rewrites > bound {
                    return Err(Divergence {
                        rewrites: stats.rewrites,
                        bound,
                        factor: config.divergence_factor,
                        initial_nodes,
                    }
                    .into());
                }
                rewritten.push(node);
            }
            Ok(rewritten)
        })?;

        graph.sweep_dead()?;

        let mut seen = HashSet::new();
        worklist = rewritten
            .into_iter()
            .chain(touched.borrow().iter().copied())
            .filter(|&node| graph.is_live(node) && seen.insert(node))
            .collect();
    }

    graph.set_insertion_point_after(None)?;
    tracing::debug!(
        patterns = Pass::name(patterns),
        sweeps = stats.sweeps,
        rewrites = stats.rewrites,
        "reached a fixed point"
    );
    Ok(stats)
}

/// A pass driving a pattern list to a fixed point with the worklist driver.
pub struct PatternRewritePass {
    patterns: RewritePatternList,
    config: RewriteConfig,
}

impl PatternRewritePass {
    pub fn new(patterns: RewritePatternList) -> Self {
        Self {
            patterns,
            config: RewriteConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RewriteConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }
}

impl Pass for PatternRewritePass {
    fn name(&self) -> &str {
        Pass::name(&self.patterns)
    }

    fn run(&self, graph: &mut Graph) -> IrResult<bool> {
        let stats = apply_until_fixpoint(graph, &self.patterns, &self.config)?;
        Ok(stats.rewrites > 0)
    }
}
