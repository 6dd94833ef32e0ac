//! Dialect registration.
//!
//! Concrete node kinds are zero-sized marker types implementing [`OpKind`].
//! They are collected into a [`DialectRegistry`] through a [`RegistryBuilder`]
//! during an explicit initialization phase; once built, the registry is frozen
//! behind an `Arc` and only read. Registering a name twice is a configuration
//! error, never a silent overwrite.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use cranelift_entity::PrimaryMap;

use crate::attribute::{Attribute, Attrs, Location};
use crate::core_dialect::{GetElement, Output, Placeholder};
use crate::error::{ConfigError, IrResult, StructuralError, TypeError};
use crate::graph::Graph;
use crate::infer::InferCx;
use crate::refs::{NodeRef, OpId};
use crate::types::TypeNotation;

// ============================================================================
// Names and arity
// ============================================================================

/// Namespace-qualified operation name, e.g. `canon.add_mm`.
///
/// The core dialect uses the empty namespace, so its ops print bare
/// (`placeholder`, `output`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpName {
    namespace: &'static str,
    name: &'static str,
}

impl OpName {
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// Number of operand slots an operation accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Variadic => f.write_str("any number of"),
        }
    }
}

// ============================================================================
// Plug-in contract
// ============================================================================

/// Type inference rule of an operation.
pub type InferFn = fn(&InferCx<'_>) -> Result<TypeNotation, TypeError>;

/// Builds an unattached node from a foreign operation record.
pub type ForeignFactory = fn(&mut Graph, &ForeignOp<'_>) -> IrResult<NodeRef>;

/// A concrete node kind contributed by a dialect.
pub trait OpKind: 'static {
    /// Dialect namespace; empty for the core dialect.
    const NAMESPACE: &'static str;
    /// Canonical lower-case snake-case operation name.
    const NAME: &'static str;
    const ARITY: Arity;

    fn op_name() -> OpName {
        OpName::new(Self::NAMESPACE, Self::NAME)
    }

    /// Compute the result type from resolved operand types.
    ///
    /// Rules must validate their preconditions and fail with a [`TypeError`]
    /// rather than produce `Unknown`.
    fn infer_type(cx: &InferCx<'_>) -> Result<TypeNotation, TypeError> {
        Err(TypeError::MissingRule { op: cx.op() })
    }
}

/// A named collection of op kinds registered together.
pub trait Dialect {
    const NAMESPACE: &'static str;

    fn register(builder: &mut RegistryBuilder) -> Result<(), ConfigError>;
}

/// Registered metadata for one operation kind.
#[derive(Clone, Debug)]
pub struct OpInfo {
    pub name: OpName,
    pub arity: Arity,
    pub infer: InferFn,
    pub type_name: &'static str,
}

// ============================================================================
// Foreign operation records
// ============================================================================

/// One positional argument of a foreign operation record.
#[derive(Clone, Debug, PartialEq)]
pub enum ForeignArg {
    Node(NodeRef),
    Literal(Attribute),
    Absent,
}

/// A foreign operation record handed to a [`ForeignFactory`].
#[derive(Clone, Debug)]
pub struct ForeignOp<'a> {
    pub id: &'a str,
    pub args: &'a [ForeignArg],
    pub attrs: &'a Attrs,
    pub location: Option<Location>,
}

impl ForeignOp<'_> {
    /// Positional node argument that must be present.
    pub fn node(&self, index: usize) -> IrResult<NodeRef> {
        match self.args.get(index) {
            Some(ForeignArg::Node(node)) => Ok(*node),
            _ => Err(self.invalid(format!("argument {index} must be a value")).into()),
        }
    }

    /// Positional node argument that may be absent.
    pub fn optional_node(&self, index: usize) -> IrResult<Option<NodeRef>> {
        match self.args.get(index) {
            Some(ForeignArg::Node(node)) => Ok(Some(*node)),
            Some(ForeignArg::Absent) | None => Ok(None),
            Some(ForeignArg::Literal(_)) => {
                Err(self.invalid(format!("argument {index} must be a value or absent")).into())
            }
        }
    }

    /// A literal parameter given either positionally or by keyword.
    pub fn param(&self, index: usize, key: &str) -> Option<&Attribute> {
        match self.args.get(index) {
            Some(ForeignArg::Literal(attr)) => Some(attr),
            _ => self.attrs.get(key),
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> StructuralError {
        StructuralError::InvalidOperation {
            op: self.id.to_owned(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Core op kinds every registry carries.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CoreOps {
    pub placeholder: OpId,
    pub output: OpId,
    pub get_element: OpId,
}

/// Frozen table of operation kinds and foreign-op factories.
pub struct DialectRegistry {
    ops: PrimaryMap<OpId, OpInfo>,
    by_name: HashMap<String, OpId>,
    by_kind: HashMap<TypeId, OpId>,
    foreign: BTreeMap<String, ForeignFactory>,
    core: CoreOps,
}

impl DialectRegistry {
    /// Start a registry holding only the core dialect.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up the id of a concrete kind.
    pub fn op_id<K: OpKind>(&self) -> Result<OpId, ConfigError> {
        self.by_kind
            .get(&TypeId::of::<K>())
            .copied()
            .ok_or(ConfigError::UnregisteredKind(std::any::type_name::<K>()))
    }

    /// Look up an operation by its qualified name (`canon.add`).
    pub fn lookup(&self, name: &str) -> Result<OpId, ConfigError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownOp(name.to_owned()))
    }

    pub fn info(&self, op: OpId) -> &OpInfo {
        &self.ops[op]
    }

    /// Whether `op` is the registered id of kind `K`.
    pub fn is<K: OpKind>(&self, op: OpId) -> bool {
        self.by_kind.get(&TypeId::of::<K>()) == Some(&op)
    }

    /// All registered operations in registration order.
    pub fn ops(&self) -> impl Iterator<Item = &OpInfo> {
        self.ops.values()
    }

    pub fn foreign(&self, id: &str) -> Result<ForeignFactory, ConfigError> {
        self.foreign
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownForeignOp(id.to_owned()))
    }

    /// Registered foreign operation identifiers, sorted.
    pub fn foreign_ids(&self) -> impl Iterator<Item = &str> {
        self.foreign.keys().map(String::as_str)
    }

    pub(crate) fn core(&self) -> CoreOps {
        self.core
    }
}

/// Mutable registration phase of a [`DialectRegistry`].
pub struct RegistryBuilder {
    ops: PrimaryMap<OpId, OpInfo>,
    by_name: HashMap<String, OpId>,
    by_kind: HashMap<TypeId, OpId>,
    foreign: BTreeMap<String, ForeignFactory>,
    core: CoreOps,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let mut ops = PrimaryMap::new();
        let mut by_name = HashMap::new();
        let mut by_kind = HashMap::new();
        let mut insert = |info: OpInfo, kind: TypeId| {
            let id = ops.push(info.clone());
            by_name.insert(info.name.to_string(), id);
            by_kind.insert(kind, id);
            id
        };
        let core = CoreOps {
            placeholder: insert(op_info::<Placeholder>(), TypeId::of::<Placeholder>()),
            output: insert(op_info::<Output>(), TypeId::of::<Output>()),
            get_element: insert(op_info::<GetElement>(), TypeId::of::<GetElement>()),
        };
        Self {
            ops,
            by_name,
            by_kind,
            foreign: BTreeMap::new(),
            core,
        }
    }

    /// Register a concrete op kind under its qualified name.
    pub fn register<K: OpKind>(&mut self) -> Result<&mut Self, ConfigError> {
        let info = op_info::<K>();
        let qualified = info.name.to_string();
        if !is_canonical(K::NAME) || !(K::NAMESPACE.is_empty() || is_canonical(K::NAMESPACE)) {
            return Err(ConfigError::NonCanonicalName(qualified));
        }
        if self.by_name.contains_key(&qualified) || self.by_kind.contains_key(&TypeId::of::<K>())
        {
            return Err(ConfigError::DuplicateOp(qualified));
        }
        let id = self.ops.push(info);
        self.by_name.insert(qualified, id);
        self.by_kind.insert(TypeId::of::<K>(), id);
        Ok(self)
    }

    /// Register every kind of a dialect.
    pub fn register_dialect<D: Dialect>(&mut self) -> Result<&mut Self, ConfigError> {
        tracing::debug!(dialect = D::NAMESPACE, "registering dialect");
        D::register(self)?;
        Ok(self)
    }

    /// Map a foreign operation identifier to a node factory.
    pub fn register_foreign(
        &mut self,
        id: impl Into<String>,
        factory: ForeignFactory,
    ) -> Result<&mut Self, ConfigError> {
        let id = id.into();
        if self.foreign.contains_key(&id) {
            return Err(ConfigError::DuplicateForeignOp(id));
        }
        self.foreign.insert(id, factory);
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> Arc<DialectRegistry> {
        Arc::new(DialectRegistry {
            ops: self.ops,
            by_name: self.by_name,
            by_kind: self.by_kind,
            foreign: self.foreign,
            core: self.core,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn op_info<K: OpKind>() -> OpInfo {
    OpInfo {
        name: K::op_name(),
        arity: K::ARITY,
        infer: K::infer_type,
        type_name: std::any::type_name::<K>(),
    }
}

fn is_canonical(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_dialect::{TestAdd, TestDialect};

    struct Shadow;

    impl OpKind for Shadow {
        const NAMESPACE: &'static str = "test";
        const NAME: &'static str = "add";
        const ARITY: Arity = Arity::Fixed(2);
    }

    struct Shouty;

    impl OpKind for Shouty {
        const NAMESPACE: &'static str = "test";
        const NAME: &'static str = "AddMM";
        const ARITY: Arity = Arity::Fixed(3);
    }

    fn dummy_factory(_graph: &mut Graph, op: &ForeignOp<'_>) -> IrResult<NodeRef> {
        op.node(0)
    }

    #[test]
    fn core_ops_are_always_registered() {
        let registry = DialectRegistry::builder().build();
        assert!(registry.lookup("placeholder").is_ok());
        assert!(registry.lookup("output").is_ok());
        assert!(registry.lookup("get_element").is_ok());
        assert!(registry.is::<Placeholder>(registry.core().placeholder));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut builder = DialectRegistry::builder();
        builder.register_dialect::<TestDialect>().unwrap();
        let err = builder.register::<Shadow>().err().unwrap();
        assert_eq!(err, ConfigError::DuplicateOp("test.add".to_owned()));
    }

    #[test]
    fn duplicate_kind_is_rejected() {
        let mut builder = DialectRegistry::builder();
        builder.register::<TestAdd>().unwrap();
        assert!(matches!(
            builder.register::<TestAdd>(),
            Err(ConfigError::DuplicateOp(_))
        ));
    }

    #[test]
    fn non_canonical_name_is_rejected() {
        let mut builder = DialectRegistry::builder();
        assert!(matches!(
            builder.register::<Shouty>(),
            Err(ConfigError::NonCanonicalName(_))
        ));
    }

    #[test]
    fn unknown_lookups_fail() {
        let registry = DialectRegistry::builder().build();
        assert_eq!(
            registry.lookup("test.add").unwrap_err(),
            ConfigError::UnknownOp("test.add".to_owned())
        );
        assert!(matches!(
            registry.op_id::<TestAdd>(),
            Err(ConfigError::UnregisteredKind(_))
        ));
        assert!(matches!(
            registry.foreign("aten::mm"),
            Err(ConfigError::UnknownForeignOp(_))
        ));
    }

    #[test]
    fn foreign_factories_are_unique() {
        let mut builder = DialectRegistry::builder();
        builder.register_foreign("x::id", dummy_factory).unwrap();
        assert_eq!(
            builder.register_foreign("x::id", dummy_factory).err(),
            Some(ConfigError::DuplicateForeignOp("x::id".to_owned()))
        );
        let registry = builder.build();
        assert_eq!(registry.foreign_ids().collect::<Vec<_>>(), vec!["x::id"]);
    }

    #[test]
    fn qualified_names() {
        assert_eq!(OpName::new("", "output").to_string(), "output");
        assert_eq!(OpName::new("canon", "add_mm").to_string(), "canon.add_mm");
        assert_eq!(Arity::AtLeast(1).to_string(), "at least 1");
        assert!(Arity::Variadic.accepts(0));
        assert!(!Arity::Fixed(2).accepts(3));
    }
}
