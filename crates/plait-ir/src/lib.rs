//! Plait IR: a mutable, dialect-extensible graph IR.
//!
//! The crate provides the compiler middle-end substrate: structural type
//! notation, an arena-backed node model with use-def chains and memoized type
//! inference, a graph with an insertion cursor and mutation listeners, passes
//! and pipelines, and a rewrite-pattern engine with a terminating fixpoint
//! driver. Concrete op sets live in separate dialect crates and plug in
//! through [`RegistryBuilder`].

// === Values and types ===
pub mod attribute;
pub mod types;

// === Node model ===
pub mod core_dialect;
pub mod infer;
pub mod node;
pub mod refs;
pub mod registry;

// === Graph ===
pub mod graph;
pub mod listener;
pub mod printer;

// === Transformation ===
pub mod pass;
pub mod rewrite;

pub mod error;

#[cfg(test)]
mod test_dialect;

pub use attribute::{Attribute, Attrs, Location};
pub use core_dialect::{GetElement, Output, Placeholder};
pub use error::{ConfigError, Divergence, IrError, IrResult, StructuralError, TypeError};
pub use graph::{Graph, NodeBuilder};
pub use infer::InferCx;
pub use listener::{GraphListener, GraphView, InsertionCursor};
pub use node::{NodeArena, NodeData, Use};
pub use pass::{FnPass, Pass, Pipeline, UntilStable};
pub use printer::print_graph;
pub use refs::{ListenerId, NodeRef, OpId};
pub use registry::{
    Arity, Dialect, DialectRegistry, ForeignArg, ForeignFactory, ForeignOp, InferFn, OpInfo,
    OpKind, OpName, RegistryBuilder,
};
pub use rewrite::{
    PatternRewritePass, PatternTarget, RewriteConfig, RewritePattern, RewritePatternList,
    RewriteStats, TypedRewritePattern, apply_until_fixpoint,
};
pub use types::{BroadcastError, TypeNotation, broadcast_shape};
