//! Error taxonomy for the IR.
//!
//! Every failure is fatal for the run that hit it: errors are propagated to
//! the caller of the top-level pipeline and never recovered locally.

use derive_more::{Display, From};

use crate::NodeRef;
use crate::registry::{Arity, OpName};
use crate::types::{BroadcastError, TypeNotation};

pub type IrResult<T> = Result<T, IrError>;

#[derive(Clone, Debug, Display, From, PartialEq)]
pub enum IrError {
    #[display("configuration error: {_0}")]
    Config(ConfigError),

    #[display("structural precondition violated: {_0}")]
    Structural(StructuralError),

    #[display("type error: {_0}")]
    Type(TypeError),

    #[display("divergent rewrite: {_0}")]
    DivergentRewrite(Divergence),
}

impl IrError {
    /// Whether this error reports a runaway pattern set rather than a bad
    /// program or a bad dialect setup.
    pub fn is_divergent(&self) -> bool {
        matches!(self, IrError::DivergentRewrite(_))
    }
}

impl std::error::Error for IrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IrError::Config(e) => Some(e),
            IrError::Structural(e) => Some(e),
            IrError::Type(e) => Some(e),
            IrError::DivergentRewrite(e) => Some(e),
        }
    }
}

/// Mistakes in dialect setup or name lookup.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ConfigError {
    #[display("operation `{_0}` is registered twice")]
    DuplicateOp(String),

    #[display("foreign operation `{_0}` is registered twice")]
    DuplicateForeignOp(String),

    #[display("operation name `{_0}` is not lower-case snake case")]
    NonCanonicalName(String),

    #[display("no operation named `{_0}` is registered")]
    UnknownOp(String),

    #[display("operation kind `{_0}` is not registered")]
    UnregisteredKind(&'static str),

    #[display("no factory is registered for foreign operation `{_0}`")]
    UnknownForeignOp(String),
}

impl std::error::Error for ConfigError {}

/// Misuse of the graph's structural API.
#[derive(Clone, Debug, Display, PartialEq)]
pub enum StructuralError {
    #[display("cannot {_0} while the graph is locked by a walk")]
    GraphLocked(&'static str),

    #[display("{op} takes {expected} operand(s), got {found}")]
    ArityMismatch {
        op: OpName,
        expected: Arity,
        found: usize,
    },

    #[display("{_0} is not in the node sequence")]
    NotInSequence(NodeRef),

    #[display("{_0} is already in the node sequence")]
    AlreadyInSequence(NodeRef),

    #[display("{node} has no operand slot {index}")]
    OperandIndexOutOfRange { node: NodeRef, index: usize },

    #[display("{_0} is not a placeholder and cannot stand in for a graph argument")]
    NotAnArgument(NodeRef),

    #[display("{_0} is dead")]
    DeadNode(NodeRef),

    #[display("{op}: {message}")]
    InvalidOperation { op: String, message: String },
}

impl std::error::Error for StructuralError {}

/// A node's operands or attributes violate its inference rule.
#[derive(Clone, Debug, Display, PartialEq)]
pub enum TypeError {
    #[display("{op}: expected {expected} operand(s), found {found}")]
    OperandCount {
        op: OpName,
        expected: usize,
        found: usize,
    },

    #[display("{op}: operand {index} must be {expected}, found {found}")]
    OperandKind {
        op: OpName,
        index: usize,
        expected: &'static str,
        found: TypeNotation,
    },

    #[display("{op}: element types {lhs} and {rhs} are incompatible")]
    ElementMismatch {
        op: OpName,
        lhs: TypeNotation,
        rhs: TypeNotation,
    },

    #[display("{op}: {error}")]
    Broadcast { op: OpName, error: BroadcastError },

    #[display("{op}: {message}")]
    Invalid { op: OpName, message: String },

    #[display("{op}: missing or malformed attribute `{key}`")]
    MissingAttribute { op: OpName, key: String },

    #[display("{op}: no type inference rule is registered")]
    MissingRule { op: OpName },

    #[display("{op}: inferred type {ty} is not fully resolved")]
    Unresolved { op: OpName, ty: TypeNotation },

    #[display("{op}: operand graph contains a cycle through {node}")]
    Cycle { op: OpName, node: NodeRef },
}

impl std::error::Error for TypeError {}

/// The fixpoint driver's rewrite budget was exhausted.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(
    "{rewrites} rewrites exceeded the bound of {bound} (factor {factor} over {initial_nodes} initial nodes)"
)]
pub struct Divergence {
    pub rewrites: usize,
    pub bound: usize,
    pub factor: usize,
    pub initial_nodes: usize,
}

impl std::error::Error for Divergence {}
