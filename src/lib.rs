//! Graph import adapter and driver for the plait IR.
//!
//! [`import`] turns a frontend's JSON operation records into a [`plait_ir::Graph`]
//! through the foreign factories of a registry, and [`pipeline`] names the
//! lowering pipelines the `plait` binary can run.

pub mod error;
pub mod import;
pub mod pipeline;

pub use error::{PlaitError, PlaitErrorKind, PlaitResult};
pub use import::{GraphRecord, InputRecord, NodeRecord, import_file, import_graph, import_json};
pub use pipeline::{PipelineKind, rewrite_config};
