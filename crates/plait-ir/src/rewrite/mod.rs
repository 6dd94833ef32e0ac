//! Rewrite pattern engine.
//!
//! Patterns rewrite one candidate node at a time in place: they add
//! replacement nodes at the graph's cursor, reroute uses with
//! `Graph::replace_all_uses` and mark the original dead. A
//! [`RewritePatternList`] dispatches candidates to patterns, and
//! [`apply_until_fixpoint`] drives a list over a worklist until nothing
//! matches any more.

pub mod applicator;
pub mod list;
pub mod pattern;

pub use applicator::{PatternRewritePass, RewriteConfig, RewriteStats, apply_until_fixpoint};
pub use list::RewritePatternList;
pub use pattern::{PatternTarget, RewritePattern, TypedRewritePattern};
