//! The mutable IR graph.
//!
//! A [`Graph`] owns a [`NodeArena`] and layers the program structure on top
//! of it: an argument list of placeholders, an ordered node sequence with an
//! insertion cursor, and an output sentinel whose operands are the results.
//! Every structural mutation goes through the graph so that listeners are
//! notified and the structural lock is honoured.

use std::fmt;
use std::sync::Arc;

use cranelift_entity::EntityRef;
use smallvec::SmallVec;

use crate::attribute::{Attribute, Attrs, Location};
use crate::core_dialect::Placeholder;
use crate::error::{IrResult, StructuralError};
use crate::listener::{GraphListener, GraphView, InsertionCursor};
use crate::node::{NodeArena, NodeData};
use crate::refs::{ListenerId, NodeRef, OpId};
use crate::registry::{DialectRegistry, OpKind, OpName};
use crate::types::TypeNotation;

pub struct Graph {
    name: String,
    registry: Arc<DialectRegistry>,
    nodes: NodeArena,
    arguments: Vec<NodeRef>,
    sequence: Vec<NodeRef>,
    output: NodeRef,
    cursor: InsertionCursor,
    listeners: Vec<(ListenerId, Box<dyn GraphListener>)>,
    next_listener: usize,
    locked: bool,
}

impl Graph {
    pub fn new(name: impl Into<String>, registry: Arc<DialectRegistry>) -> Self {
        let mut nodes = NodeArena::new();
        let core = registry.core();
        let output = nodes.create_leaf(core.output, registry.info(core.output).name, Attrs::new());
        Self {
            name: name.into(),
            registry,
            nodes,
            arguments: Vec::new(),
            sequence: Vec::new(),
            output,
            cursor: InsertionCursor::default(),
            listeners: Vec::new(),
            next_listener: 0,
            locked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<DialectRegistry> {
        &self.registry
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn node(&self, node: NodeRef) -> &NodeData {
        self.nodes.get(node)
    }

    pub fn op_name(&self, node: NodeRef) -> OpName {
        self.nodes.get(node).name()
    }

    /// Whether `node` is an instance of kind `K`.
    pub fn is<K: OpKind>(&self, node: NodeRef) -> bool {
        self.registry.is::<K>(self.nodes.get(node).op())
    }

    pub fn op_id<K: OpKind>(&self) -> IrResult<OpId> {
        Ok(self.registry.op_id::<K>()?)
    }

    pub fn arguments(&self) -> &[NodeRef] {
        &self.arguments
    }

    /// Result operands, in order.
    pub fn outputs(&self) -> &[Option<NodeRef>] {
        self.nodes.get(self.output).operands()
    }

    /// The output sentinel node.
    pub fn output_node(&self) -> NodeRef {
        self.output
    }

    /// The node sequence, including dead nodes that are not yet swept.
    pub fn sequence(&self) -> &[NodeRef] {
        &self.sequence
    }

    /// Live nodes of the sequence, in order.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.sequence
            .iter()
            .copied()
            .filter(|&n| !self.nodes.get(n).is_dead())
    }

    /// Whether `node` is a live member of the node sequence.
    pub fn is_live(&self, node: NodeRef) -> bool {
        let data = self.nodes.get(node);
        !data.is_dead() && data.is_attached() && !self.arguments.contains(&node)
    }

    pub fn insertion_point(&self) -> usize {
        self.cursor.position()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn arena(&self) -> &NodeArena {
        &self.nodes
    }

    pub fn view(&self) -> GraphView<'_> {
        GraphView {
            nodes: &self.nodes,
            sequence: &self.sequence,
            registry: &self.registry,
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Start building a node of kind `K`.
    pub fn builder<K: OpKind>(&self) -> IrResult<NodeBuilder> {
        Ok(NodeBuilder::new(self.op_id::<K>()?))
    }

    /// Start building a node by qualified name, e.g. `canon.add`.
    pub fn builder_named(&self, name: &str) -> IrResult<NodeBuilder> {
        Ok(NodeBuilder::new(self.registry.lookup(name)?))
    }

    /// Create an unattached node of kind `K`.
    pub fn create<K: OpKind>(
        &mut self,
        operands: impl IntoIterator<Item = Option<NodeRef>>,
        attrs: Attrs,
    ) -> IrResult<NodeRef> {
        let op = self.op_id::<K>()?;
        self.create_node(op, operands, attrs, None)
    }

    /// Create an unattached node, checking the operand count against the
    /// kind's arity.
    pub fn create_node(
        &mut self,
        op: OpId,
        operands: impl IntoIterator<Item = Option<NodeRef>>,
        attrs: Attrs,
        location: Option<Location>,
    ) -> IrResult<NodeRef> {
        self.check_unlocked("create a node")?;
        let info = self.registry.info(op);
        let operands: SmallVec<[Option<NodeRef>; 4]> = operands.into_iter().collect();
        if !info.arity.accepts(operands.len()) {
            return Err(StructuralError::ArityMismatch {
                op: info.name,
                expected: info.arity,
                found: operands.len(),
            }
            .into());
        }
        let name = info.name;
        Ok(self.nodes.create(op, name, operands, attrs, location)?)
    }

    /// Append a placeholder to the argument list.
    pub fn add_argument(&mut self, node: NodeRef) -> IrResult<NodeRef> {
        self.check_unlocked("add an argument")?;
        if !self.is::<Placeholder>(node) {
            return Err(StructuralError::NotAnArgument(node).into());
        }
        if self.nodes.get(node).is_attached() {
            return Err(StructuralError::AlreadyInSequence(node).into());
        }
        self.nodes.set_attached(node);
        self.arguments.push(node);
        Ok(node)
    }

    /// Create a placeholder of type `ty` and append it to the arguments.
    pub fn new_argument(&mut self, ty: TypeNotation) -> IrResult<NodeRef> {
        let mut attrs = Attrs::new();
        attrs.insert("type".to_owned(), Attribute::Type(ty));
        let node = self.create::<Placeholder>([], attrs)?;
        self.add_argument(node)
    }

    /// Append a result operand to the output sentinel.
    pub fn add_output(&mut self, node: Option<NodeRef>) -> IrResult<()> {
        self.check_unlocked("add an output")?;
        Ok(self.nodes.push_operand(self.output, node)?)
    }

    /// Insert `node` at the cursor and advance the cursor past it.
    pub fn add_node(&mut self, node: NodeRef) -> IrResult<NodeRef> {
        self.check_unlocked("add a node")?;
        let data = self.nodes.get(node);
        if data.is_dead() {
            return Err(StructuralError::DeadNode(node).into());
        }
        if data.is_attached() || node == self.output {
            return Err(StructuralError::AlreadyInSequence(node).into());
        }

        let index = self.cursor.position().min(self.sequence.len());
        self.sequence.insert(index, node);
        self.nodes.set_attached(node);
        tracing::trace!(node = %node, op = %self.op_name(node), index, "added node");
        self.notify(|listener, view| listener.after_add_node(view, node, index));
        Ok(node)
    }

    /// Place the cursor before `node`, or before everything for `None`.
    pub fn set_insertion_point_before(&mut self, node: Option<NodeRef>) -> IrResult<()> {
        let position = match node {
            Some(node) => self.position_of(node)?,
            None => 0,
        };
        self.cursor.set(position);
        Ok(())
    }

    /// Place the cursor after `node`, or after everything for `None`.
    pub fn set_insertion_point_after(&mut self, node: Option<NodeRef>) -> IrResult<()> {
        let position = match node {
            Some(node) => self.position_of(node)? + 1,
            None => self.sequence.len(),
        };
        self.cursor.set(position);
        Ok(())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Mark `node` dead. It keeps its sequence slot until [`Graph::sweep_dead`].
    pub fn remove_node(&mut self, node: NodeRef) -> IrResult<()> {
        self.check_unlocked("remove a node")?;
        if node == self.output || self.arguments.contains(&node) {
            return Err(StructuralError::NotInSequence(node).into());
        }
        if !self.nodes.remove(node) {
            return Ok(());
        }
        if self.nodes.get(node).has_uses() {
            tracing::warn!(
                node = %node,
                op = %self.op_name(node),
                users = self.nodes.get(node).users().len(),
                "removed a node that still has users"
            );
        }
        self.notify(|listener, view| listener.before_remove_node(view, node));
        Ok(())
    }

    /// Drop dead nodes from the sequence. Returns how many were dropped.
    pub fn sweep_dead(&mut self) -> IrResult<usize> {
        self.check_unlocked("sweep dead nodes")?;
        self.notify(|listener, view| listener.before_sweep_dead(view));
        let before = self.sequence.len();
        let nodes = &self.nodes;
        self.sequence.retain(|&n| !nodes.get(n).is_dead());
        Ok(before - self.sequence.len())
    }

    // ========================================================================
    // Use rewiring
    // ========================================================================

    /// Set operand `index` of `node`.
    pub fn set_operand(
        &mut self,
        node: NodeRef,
        index: usize,
        new: Option<NodeRef>,
    ) -> IrResult<Option<NodeRef>> {
        self.check_unlocked("change an operand")?;
        let old = self.nodes.operand_slot(node, index)?;
        if let Some(new) = new {
            if self.nodes.get(new).is_dead() {
                return Err(StructuralError::DeadNode(new).into());
            }
        }
        self.notify(|listener, view| listener.before_operand_change(view, node, index, old, new));
        Ok(self.nodes.set_operand(node, index, new)?)
    }

    /// Set every slot of `node` holding `old` to `new`.
    pub fn replace_operand(
        &mut self,
        node: NodeRef,
        old: NodeRef,
        new: Option<NodeRef>,
    ) -> IrResult<usize> {
        let slots: SmallVec<[usize; 2]> = self
            .nodes
            .get(node)
            .operands()
            .iter()
            .enumerate()
            .filter(|(_, operand)| **operand == Some(old))
            .map(|(idx, _)| idx)
            .collect();
        for &idx in &slots {
            self.set_operand(node, idx, new)?;
        }
        Ok(slots.len())
    }

    /// Reroute every use of `old` to `new`, including the output sentinel and
    /// the argument list.
    pub fn replace_all_uses(&mut self, old: NodeRef, new: NodeRef) -> IrResult<()> {
        self.check_unlocked("replace uses")?;
        if old == new {
            return Ok(());
        }
        if self.nodes.get(new).is_dead() {
            return Err(StructuralError::DeadNode(new).into());
        }
        let argument_slots: SmallVec<[usize; 1]> = self
            .arguments
            .iter()
            .enumerate()
            .filter(|&(_, &arg)| arg == old)
            .map(|(idx, _)| idx)
            .collect();
        if !argument_slots.is_empty() {
            if !self.is::<Placeholder>(new) {
                return Err(StructuralError::NotAnArgument(new).into());
            }
            // An argument appears once; `new` must not already be one.
            if self.nodes.get(new).is_attached() {
                return Err(StructuralError::AlreadyInSequence(new).into());
            }
        }

        // Rerouting a user edits the use-chain being iterated.
        let uses: SmallVec<[crate::node::Use; 4]> = self.nodes.get(old).uses().into();
        for u in uses {
            let index = u.operand_index as usize;
            self.notify(|listener, view| {
                listener.before_operand_change(view, u.user, index, Some(old), Some(new))
            });
            self.nodes.set_operand(u.user, index, Some(new))?;
        }

        if !argument_slots.is_empty() {
            for idx in argument_slots {
                self.arguments[idx] = new;
            }
            self.nodes.set_detached(old);
            self.nodes.set_attached(new);
        }
        Ok(())
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Result type of `node`, computed on demand and memoized.
    pub fn get_type(&mut self, node: NodeRef) -> IrResult<TypeNotation> {
        Ok(self.nodes.resolve_type(&self.registry, node)?)
    }

    /// Resolve the types of every output, and so of everything they reach.
    pub fn infer_types(&mut self) -> IrResult<TypeNotation> {
        self.get_type(self.output)
    }

    // ========================================================================
    // Traversal and listeners
    // ========================================================================

    /// Visit every live node in sequence order with the graph locked.
    ///
    /// The visitor may query the graph (types included) but any structural
    /// mutation fails with [`StructuralError::GraphLocked`].
    pub fn walk(
        &mut self,
        mut visitor: impl FnMut(&mut Graph, NodeRef) -> IrResult<()>,
    ) -> IrResult<()> {
        let nodes: Vec<NodeRef> = self.live_nodes().collect();
        let was_locked = std::mem::replace(&mut self.locked, true);
        let result = nodes.into_iter().try_for_each(|node| visitor(self, node));
        self.locked = was_locked;
        result
    }

    pub fn add_listener(&mut self, listener: Box<dyn GraphListener>) -> ListenerId {
        let id = ListenerId::new(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Number of attached listeners, the built-in cursor not included.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn GraphListener>> {
        let pos = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(self.listeners.remove(pos).1)
    }

    /// Run `f` with `listener` attached, detaching it afterwards even if `f`
    /// fails.
    pub fn with_listener<R>(
        &mut self,
        listener: impl GraphListener + 'static,
        f: impl FnOnce(&mut Graph) -> IrResult<R>,
    ) -> IrResult<R> {
        let id = self.add_listener(Box::new(listener));
        let result = f(self);
        self.remove_listener(id);
        result
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn notify(&mut self, mut event: impl FnMut(&mut dyn GraphListener, GraphView<'_>)) {
        let view = GraphView {
            nodes: &self.nodes,
            sequence: &self.sequence,
            registry: &self.registry,
        };
        event(&mut self.cursor, view);
        for (_, listener) in self.listeners.iter_mut() {
            event(listener.as_mut(), view);
        }
    }

    fn check_unlocked(&self, action: &'static str) -> Result<(), StructuralError> {
        if self.locked {
            Err(StructuralError::GraphLocked(action))
        } else {
            Ok(())
        }
    }

    fn position_of(&self, node: NodeRef) -> Result<usize, StructuralError> {
        self.sequence
            .iter()
            .position(|&n| n == node)
            .ok_or(StructuralError::NotInSequence(node))
    }
}

// ============================================================================
// NodeBuilder
// ============================================================================

/// Builder for a node's operands, attributes and location.
#[derive(Clone, Debug)]
pub struct NodeBuilder {
    op: OpId,
    operands: SmallVec<[Option<NodeRef>; 4]>,
    attrs: Attrs,
    location: Option<Location>,
}

impl NodeBuilder {
    pub fn new(op: OpId) -> Self {
        Self {
            op,
            operands: SmallVec::new(),
            attrs: Attrs::new(),
            location: None,
        }
    }

    pub fn operand(mut self, node: NodeRef) -> Self {
        self.operands.push(Some(node));
        self
    }

    /// An operand slot that may be absent.
    pub fn optional_operand(mut self, node: Option<NodeRef>) -> Self {
        self.operands.push(node);
        self
    }

    pub fn operands(mut self, nodes: impl IntoIterator<Item = NodeRef>) -> Self {
        self.operands.extend(nodes.into_iter().map(Some));
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Attribute>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Create the node without attaching it.
    pub fn build(self, graph: &mut Graph) -> IrResult<NodeRef> {
        graph.create_node(self.op, self.operands, self.attrs, self.location)
    }

    /// Create the node and add it at the graph's cursor.
    pub fn insert(self, graph: &mut Graph) -> IrResult<NodeRef> {
        let node = self.build(graph)?;
        graph.add_node(node)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("sequence", &self.sequence)
            .field("outputs", &self.outputs())
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}
