//! Mutation listeners.
//!
//! A [`GraphListener`] observes structural events of a graph. Listeners are
//! invoked synchronously, in registration order, after the graph's built-in
//! [`InsertionCursor`]. They see the graph through a read-only [`GraphView`]
//! and can't mutate it; a listener that needs to hand data back to its owner
//! shares it through an `Rc<RefCell<_>>` captured at construction.

use crate::node::{NodeArena, NodeData};
use crate::refs::NodeRef;
use crate::registry::DialectRegistry;

/// Read-only view of a graph handed to listeners.
#[derive(Clone, Copy)]
pub struct GraphView<'a> {
    pub(crate) nodes: &'a NodeArena,
    pub(crate) sequence: &'a [NodeRef],
    pub(crate) registry: &'a DialectRegistry,
}

impl<'a> GraphView<'a> {
    pub fn node(&self, node: NodeRef) -> &'a NodeData {
        self.nodes.get(node)
    }

    /// The node sequence, dead nodes included until the next sweep.
    pub fn sequence(&self) -> &'a [NodeRef] {
        self.sequence
    }

    pub fn position(&self, node: NodeRef) -> Option<usize> {
        self.sequence.iter().position(|&n| n == node)
    }

    pub fn registry(&self) -> &'a DialectRegistry {
        self.registry
    }
}

/// Observer of structural graph events. Every hook defaults to doing nothing.
pub trait GraphListener {
    /// `node` was inserted into the sequence at `index`.
    fn after_add_node(&mut self, _view: GraphView<'_>, _node: NodeRef, _index: usize) {}

    /// `node` has just been marked dead; it still occupies its sequence slot.
    fn before_remove_node(&mut self, _view: GraphView<'_>, _node: NodeRef) {}

    /// Dead nodes are about to be dropped from the sequence.
    fn before_sweep_dead(&mut self, _view: GraphView<'_>) {}

    /// Operand `index` of `user` is about to change from `old` to `new`.
    fn before_operand_change(
        &mut self,
        _view: GraphView<'_>,
        _user: NodeRef,
        _index: usize,
        _old: Option<NodeRef>,
        _new: Option<NodeRef>,
    ) {
    }
}

/// Keeps the graph's insertion index correct as the sequence changes.
///
/// Always attached; it runs before any user listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsertionCursor {
    position: usize,
}

impl InsertionCursor {
    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn set(&mut self, position: usize) {
        self.position = position;
    }
}

impl GraphListener for InsertionCursor {
    fn after_add_node(&mut self, _view: GraphView<'_>, _node: NodeRef, index: usize) {
        // Inserting at or before the cursor shifts it right, which is also
        // how a plain `add_node` advances past the node it just placed.
        if index <= self.position {
            self.position += 1;
        }
    }

    fn before_sweep_dead(&mut self, view: GraphView<'_>) {
        let end = self.position.min(view.sequence.len());
        self.position = view.sequence[..end]
            .iter()
            .filter(|&&n| !view.nodes.get(n).is_dead())
            .count();
    }
}
