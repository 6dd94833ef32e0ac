//! Debug text rendering of a graph.
//!
//! ```text
//! graph linear(arg0: tensor([4], float), arg1: tensor([2, 3], float), arg2: tensor([3, 4], float)) {
//!   v0 = aten.addmm(arg0, arg1, arg2) {alpha = 1, beta = 1}
//!   output(v0)
//! }
//! ```
//!
//! Arguments are numbered `arg0..`, live nodes `v0..` in sequence order.
//! Absent operands print as `none`; references to nodes outside the graph
//! print as their raw ref (`node7`). The format is for diagnostics only and
//! is never parsed back.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::attribute::Attrs;
use crate::graph::Graph;
use crate::refs::NodeRef;

/// Print a graph, optionally suffixing each node with its memoized type.
///
/// Types are not computed here; call [`Graph::infer_types`] first to see
/// them resolved. Uncomputed types print as `?`.
pub fn print_graph(graph: &Graph, show_types: bool) -> String {
    let mut out = String::new();
    write_graph(graph, show_types, &mut out).expect("fmt::Write to String never fails");
    out
}

struct Names {
    names: HashMap<NodeRef, String>,
}

impl Names {
    fn new(graph: &Graph) -> Self {
        let mut names = HashMap::new();
        for (idx, &arg) in graph.arguments().iter().enumerate() {
            names.insert(arg, format!("arg{idx}"));
        }
        for (idx, node) in graph.live_nodes().enumerate() {
            names.insert(node, format!("v{idx}"));
        }
        Self { names }
    }

    fn write_operand(&self, f: &mut impl Write, operand: Option<NodeRef>) -> fmt::Result {
        match operand {
            None => f.write_str("none"),
            Some(node) => match self.names.get(&node) {
                Some(name) => f.write_str(name),
                None => write!(f, "{node}"),
            },
        }
    }

    fn write_operands(&self, f: &mut impl Write, operands: &[Option<NodeRef>]) -> fmt::Result {
        f.write_char('(')?;
        for (i, &operand) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            self.write_operand(f, operand)?;
        }
        f.write_char(')')
    }
}

fn write_graph(graph: &Graph, show_types: bool, f: &mut impl Write) -> fmt::Result {
    let names = Names::new(graph);

    write!(f, "graph {}(", graph.name())?;
    for (i, &arg) in graph.arguments().iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "arg{i}: ")?;
        match graph.node(arg).attr("type") {
            Some(ty) => write!(f, "{ty}")?,
            None => f.write_char('?')?,
        }
    }
    f.write_str(") {\n")?;

    for (idx, node) in graph.live_nodes().enumerate() {
        let data = graph.node(node);
        write!(f, "  v{idx} = {}", data.name())?;
        names.write_operands(f, data.operands())?;
        write_attrs(f, data.attrs())?;
        if show_types {
            write!(f, " : {}", data.cached_type())?;
        }
        f.write_char('\n')?;
    }

    f.write_str("  output")?;
    names.write_operands(f, graph.outputs())?;
    f.write_str("\n}\n")
}

fn write_attrs(f: &mut impl Write, attrs: &Attrs) -> fmt::Result {
    if attrs.is_empty() {
        return Ok(());
    }
    f.write_str(" {")?;
    for (i, (key, value)) in attrs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key} = {value}")?;
    }
    f.write_char('}')
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_graph(self, false, f)
    }
}
