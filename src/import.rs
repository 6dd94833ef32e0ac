//! Import of foreign operation records into a [`Graph`].
//!
//! A frontend hands over a traced program as JSON:
//!
//! ```json
//! {
//!   "name": "linear",
//!   "inputs": [{"name": "x", "type": {"kind": "tensor", "shape": [2, 3], "element": {"kind": "scalar", "name": "float"}}}],
//!   "nodes": [{"name": "y", "op": "aten::relu", "args": ["x"], "attrs": {}}],
//!   "outputs": ["y"]
//! }
//! ```
//!
//! In `args`, a string names an earlier input or node, `null` is an absent
//! optional operand and any other value is a literal. Each record is turned
//! into a node by the foreign factory registered under its `op` id.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use plait_ir::{
    Attribute, Attrs, DialectRegistry, ForeignArg, ForeignOp, Graph, IrError, Location, NodeRef,
    TypeNotation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlaitError, PlaitResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub outputs: Vec<Option<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeNotation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub op: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,
}

pub fn import_file(path: impl AsRef<Path>, registry: Arc<DialectRegistry>) -> PlaitResult<Graph> {
    let text = std::fs::read_to_string(path)?;
    import_json(&text, registry)
}

pub fn import_json(text: &str, registry: Arc<DialectRegistry>) -> PlaitResult<Graph> {
    let record: GraphRecord = serde_json::from_str(text)?;
    import_graph(&record, registry)
}

/// Build a graph from its record, resolving every op through `registry`.
pub fn import_graph(record: &GraphRecord, registry: Arc<DialectRegistry>) -> PlaitResult<Graph> {
    let mut graph = Graph::new(record.name.clone(), registry);
    let mut values: HashMap<&str, NodeRef> = HashMap::new();

    for input in &record.inputs {
        let arg = graph.new_argument(input.ty.clone())?;
        define(&mut values, &input.name, arg)?;
    }

    for node in &record.nodes {
        let factory = graph.registry().foreign(&node.op).map_err(IrError::from)?;
        let args = node
            .args
            .iter()
            .map(|arg| convert_arg(&values, &node.name, arg))
            .collect::<PlaitResult<Vec<_>>>()?;
        let attrs = node
            .attrs
            .iter()
            .map(|(key, value)| convert_literal(&node.name, value).map(|attr| (key.clone(), attr)))
            .collect::<PlaitResult<Attrs>>()?;

        let op = ForeignOp {
            id: &node.op,
            args: &args,
            attrs: &attrs,
            location: Some(Location::named(node.name.as_str())),
        };
        let created = factory(&mut graph, &op)?;
        graph.add_node(created)?;
        define(&mut values, &node.name, created)?;
    }

    for output in &record.outputs {
        let node = match output {
            Some(name) => Some(lookup(&values, "output", name)?),
            None => None,
        };
        graph.add_output(node)?;
    }

    tracing::debug!(
        graph = %record.name,
        inputs = record.inputs.len(),
        nodes = record.nodes.len(),
        "imported graph"
    );
    Ok(graph)
}

fn define<'a>(
    values: &mut HashMap<&'a str, NodeRef>,
    name: &'a str,
    node: NodeRef,
) -> PlaitResult<()> {
    if values.insert(name, node).is_some() {
        return Err(PlaitError::duplicate_value(name));
    }
    Ok(())
}

fn lookup(values: &HashMap<&str, NodeRef>, node: &str, name: &str) -> PlaitResult<NodeRef> {
    values
        .get(name)
        .copied()
        .ok_or_else(|| PlaitError::unknown_value(node, name))
}

fn convert_arg(values: &HashMap<&str, NodeRef>, node: &str, arg: &Value) -> PlaitResult<ForeignArg> {
    match arg {
        Value::Null => Ok(ForeignArg::Absent),
        Value::String(name) => lookup(values, node, name).map(ForeignArg::Node),
        literal => convert_literal(node, literal).map(ForeignArg::Literal),
    }
}

fn convert_literal(node: &str, value: &Value) -> PlaitResult<Attribute> {
    match value {
        Value::Bool(b) => Ok(Attribute::Bool(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Attribute::Int(i)),
            (None, Some(f)) => Ok(Attribute::Float(f)),
            (None, None) => Err(PlaitError::unsupported_literal(node, n)),
        },
        Value::String(s) => Ok(Attribute::String(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| convert_literal(node, item))
            .collect::<PlaitResult<Vec<_>>>()
            .map(Attribute::List),
        Value::Null | Value::Object(_) => Err(PlaitError::unsupported_literal(node, value)),
    }
}
