//! Node storage and use-def bookkeeping.
//!
//! Nodes live in a [`NodeArena`] owned by their graph and refer to each other
//! through [`NodeRef`] indices. Operand slots are plain indices; the reverse
//! edges are kept in a per-node use-chain that every mutation below updates
//! in the same step.

use std::collections::HashSet;

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::attribute::{Attribute, Attrs, Location};
use crate::error::{StructuralError, TypeError};
use crate::infer::InferCx;
use crate::refs::{NodeRef, OpId};
use crate::registry::{DialectRegistry, OpName};
use crate::types::TypeNotation;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a node: which node uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: NodeRef,
    pub operand_index: u32,
}

// ============================================================================
// Node data
// ============================================================================

/// Data for a single node in the arena.
#[derive(Clone, Debug)]
pub struct NodeData {
    op: OpId,
    name: OpName,
    operands: SmallVec<[Option<NodeRef>; 4]>,
    attrs: Attrs,
    location: Option<Location>,
    uses: SmallVec<[Use; 2]>,
    dead: bool,
    attached: bool,
    cached_type: TypeNotation,
}

impl NodeData {
    pub fn op(&self) -> OpId {
        self.op
    }

    /// Qualified operation name.
    pub fn name(&self) -> OpName {
        self.name
    }

    pub fn operands(&self) -> &[Option<NodeRef>] {
        &self.operands
    }

    /// Operand at `index`; `None` both for an absent operand and an
    /// out-of-range index.
    pub fn operand(&self, index: usize) -> Option<NodeRef> {
        self.operands.get(index).copied().flatten()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Attribute> {
        self.attrs.get(key)
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Every (user, slot) pair referencing this node.
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn has_uses(&self) -> bool {
        !self.uses.is_empty()
    }

    /// Distinct users in first-use order.
    pub fn users(&self) -> Vec<NodeRef> {
        let mut seen = HashSet::new();
        self.uses
            .iter()
            .map(|u| u.user)
            .filter(|user| seen.insert(*user))
            .collect()
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Whether the node was placed in a graph's sequence or argument list.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Memoized result type; `Unknown` until computed or after invalidation.
    pub fn cached_type(&self) -> &TypeNotation {
        &self.cached_type
    }
}

// ============================================================================
// NodeArena
// ============================================================================

/// Arena of nodes with automatically maintained use-chains and type memos.
///
/// Slots are never reclaimed: a removed node stays in the arena, dead, for
/// as long as the arena lives, so every [`NodeRef`] handed out stays valid.
/// Each rewrite therefore grows the arena by the nodes it creates, and a
/// long fixpoint run holds all of its intermediate nodes until the graph is
/// dropped.
#[derive(Default)]
pub struct NodeArena {
    nodes: PrimaryMap<NodeRef, NodeData>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and register its operand uses.
    ///
    /// Operands must be live nodes of this arena.
    pub fn create(
        &mut self,
        op: OpId,
        name: OpName,
        operands: impl IntoIterator<Item = Option<NodeRef>>,
        attrs: Attrs,
        location: Option<Location>,
    ) -> Result<NodeRef, StructuralError> {
        let operands: SmallVec<[Option<NodeRef>; 4]> = operands.into_iter().collect();
        for operand in operands.iter().flatten() {
            self.ensure_live(*operand)?;
        }

        let node = self.create_leaf(op, name, attrs);
        self.nodes[node].location = location;
        self.nodes[node].operands = operands.clone();
        for (idx, operand) in operands.iter().enumerate() {
            if let Some(operand) = operand {
                self.nodes[*operand].uses.push(Use {
                    user: node,
                    operand_index: idx as u32,
                });
            }
        }
        Ok(node)
    }

    /// Allocate a node without operands.
    pub fn create_leaf(&mut self, op: OpId, name: OpName, attrs: Attrs) -> NodeRef {
        self.nodes.push(NodeData {
            op,
            name,
            operands: SmallVec::new(),
            attrs,
            location: None,
            uses: SmallVec::new(),
            dead: false,
            attached: false,
            cached_type: TypeNotation::Unknown,
        })
    }

    pub fn get(&self, node: NodeRef) -> &NodeData {
        &self.nodes[node]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &NodeData)> {
        self.nodes.iter()
    }

    pub(crate) fn set_attached(&mut self, node: NodeRef) {
        self.nodes[node].attached = true;
    }

    pub(crate) fn set_detached(&mut self, node: NodeRef) {
        self.nodes[node].attached = false;
    }

    /// Current operand at `index`, validating that the slot can be changed.
    pub fn operand_slot(
        &self,
        node: NodeRef,
        index: usize,
    ) -> Result<Option<NodeRef>, StructuralError> {
        let data = &self.nodes[node];
        if data.dead {
            return Err(StructuralError::DeadNode(node));
        }
        data.operands
            .get(index)
            .copied()
            .ok_or(StructuralError::OperandIndexOutOfRange { node, index })
    }

    /// Replace the reference at `index`, returning the previous one.
    ///
    /// The old user-edge is retracted before the new one is installed, and
    /// the node's type memo is invalidated along with every memo that was
    /// computed from it.
    pub fn set_operand(
        &mut self,
        node: NodeRef,
        index: usize,
        new: Option<NodeRef>,
    ) -> Result<Option<NodeRef>, StructuralError> {
        self.operand_slot(node, index)?;
        if let Some(new) = new {
            self.ensure_live(new)?;
        }

        let old = std::mem::replace(&mut self.nodes[node].operands[index], new);
        let slot = Use {
            user: node,
            operand_index: index as u32,
        };
        if let Some(old) = old {
            self.retract_use(old, slot);
        }
        if let Some(new) = new {
            self.nodes[new].uses.push(slot);
        }
        self.invalidate(node);
        Ok(old)
    }

    /// Set every slot of `node` holding `old` to `new`. Returns how many
    /// slots changed.
    pub fn replace_operand(
        &mut self,
        node: NodeRef,
        old: NodeRef,
        new: Option<NodeRef>,
    ) -> Result<usize, StructuralError> {
        let slots: SmallVec<[usize; 2]> = self.nodes[node]
            .operands
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

    /// Append an operand slot (variadic nodes such as the output sentinel).
    pub fn push_operand(
        &mut self,
        node: NodeRef,
        operand: Option<NodeRef>,
    ) -> Result<(), StructuralError> {
        if self.nodes[node].dead {
            return Err(StructuralError::DeadNode(node));
        }
        if let Some(operand) = operand {
            self.ensure_live(operand)?;
        }
        let index = self.nodes[node].operands.len();
        self.nodes[node].operands.push(operand);
        if let Some(operand) = operand {
            self.nodes[operand].uses.push(Use {
                user: node,
                operand_index: index as u32,
            });
        }
        self.invalidate(node);
        Ok(())
    }

    /// Mark `node` dead, retract its outgoing edges and drop its type memo.
    ///
    /// Users of `node` are left alone; rerouting them is the caller's job.
    /// Returns `false` if the node was already dead.
    pub fn remove(&mut self, node: NodeRef) -> bool {
        if self.nodes[node].dead {
            return false;
        }
        self.nodes[node].dead = true;
        let operands = std::mem::take(&mut self.nodes[node].operands);
        for (idx, operand) in operands.iter().enumerate() {
            if let Some(operand) = operand {
                self.retract_use(
                    *operand,
                    Use {
                        user: node,
                        operand_index: idx as u32,
                    },
                );
            }
        }
        self.nodes[node].operands = operands.iter().map(|_| None).collect();
        self.invalidate(node);
        true
    }

    /// Reset the memo of `node` and of every node whose memo depends on it.
    ///
    /// A user can only hold a computed type if all of its operands do, so
    /// propagation stops at users that are already `Unknown`.
    pub fn invalidate(&mut self, node: NodeRef) {
        let data = &mut self.nodes[node];
        data.cached_type = TypeNotation::Unknown;
        let mut stack: Vec<NodeRef> = data.uses.iter().map(|u| u.user).collect();
        while let Some(user) = stack.pop() {
            let data = &mut self.nodes[user];
            if data.cached_type.is_unknown() {
                continue;
            }
            data.cached_type = TypeNotation::Unknown;
            stack.extend(data.uses.iter().map(|u| u.user));
        }
    }

    /// Return the memoized type of `root`, computing it and any unresolved
    /// operand types first.
    pub fn resolve_type(
        &mut self,
        registry: &DialectRegistry,
        root: NodeRef,
    ) -> Result<TypeNotation, TypeError> {
        if !self.nodes[root].cached_type.is_unknown() {
            return Ok(self.nodes[root].cached_type.clone());
        }

        // Iterative post-order so deep chains cannot overflow the stack.
        let mut stack = vec![(root, false)];
        let mut in_progress = HashSet::new();
        while let Some((node, expanded)) = stack.pop() {
            if !self.nodes[node].cached_type.is_unknown() {
                continue;
            }
            if expanded {
                let ty = self.infer(registry, node)?;
                self.nodes[node].cached_type = ty;
                in_progress.remove(&node);
                continue;
            }

            in_progress.insert(node);
            stack.push((node, true));
            for operand in self.nodes[node].operands.iter().flatten() {
                if !self.nodes[*operand].cached_type.is_unknown() {
                    continue;
                }
                if in_progress.contains(operand) {
                    return Err(TypeError::Cycle {
                        op: self.nodes[node].name,
                        node: *operand,
                    });
                }
                stack.push((*operand, false));
            }
        }
        Ok(self.nodes[root].cached_type.clone())
    }

    /// Run the inference rule of `node` over its (already resolved) operands.
    fn infer(&self, registry: &DialectRegistry, node: NodeRef) -> Result<TypeNotation, TypeError> {
        let data = &self.nodes[node];
        let operand_types: SmallVec<[TypeNotation; 4]> = data
            .operands
            .iter()
            .map(|operand| match operand {
                Some(operand) => self.nodes[*operand].cached_type.clone(),
                None => TypeNotation::None,
            })
            .collect();

        let info = registry.info(data.op);
        let cx = InferCx::new(data.name, &operand_types, &data.attrs);
        let ty = (info.infer)(&cx)?;
        if !ty.is_resolved() {
            return Err(TypeError::Unresolved { op: data.name, ty });
        }
        tracing::trace!(node = %node, op = %data.name, ty = %ty, "inferred type");
        Ok(ty)
    }

    fn ensure_live(&self, node: NodeRef) -> Result<(), StructuralError> {
        if self.nodes[node].dead {
            Err(StructuralError::DeadNode(node))
        } else {
            Ok(())
        }
    }

    fn retract_use(&mut self, operand: NodeRef, slot: Use) {
        let uses = &mut self.nodes[operand].uses;
        if let Some(pos) = uses.iter().position(|u| *u == slot) {
            uses.swap_remove(pos);
        }
    }
}
