//! Entity references.
//!
//! Each ref type is a thin `u32` wrapper indexing into a `PrimaryMap`. Refs are
//! `Copy` and never own what they point at.

use cranelift_entity::entity_impl;

/// Reference to a node in a graph's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(u32);
entity_impl!(NodeRef, "node");

/// Reference to a registered operation kind in a [`DialectRegistry`](crate::DialectRegistry).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u32);
entity_impl!(OpId, "op");

/// Handle of a listener attached to a graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);
entity_impl!(ListenerId, "listener");
