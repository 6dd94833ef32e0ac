//! Named pipelines the driver can run.

use std::path::Path;

use clap::ValueEnum;
use plait_dialect::{aten_to_canon, canonicalize, decompose_addmm};
use plait_ir::{Pipeline, RewriteConfig};

use crate::error::PlaitResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PipelineKind {
    /// Import and type the graph only.
    None,
    /// Rename `aten` ops into the canonical dialect.
    AtenToCanon,
    /// Split fused `add_mm` into primitive arithmetic.
    DecomposeAddmm,
    /// Full lowering to primitive canonical ops.
    #[default]
    Canonicalize,
}

impl PipelineKind {
    pub fn build(self, config: RewriteConfig) -> Pipeline {
        match self {
            PipelineKind::None => Pipeline::new("none"),
            PipelineKind::AtenToCanon => {
                Pipeline::new("aten-to-canon").with_step(aten_to_canon(config))
            }
            PipelineKind::DecomposeAddmm => {
                Pipeline::new("decompose-addmm").with_step(decompose_addmm(config))
            }
            PipelineKind::Canonicalize => canonicalize(config),
        }
    }
}

/// Rewrite configuration from an optional JSON file, with the
/// command-line factor taking precedence over the file.
pub fn rewrite_config(
    file: Option<&Path>,
    divergence_factor: Option<usize>,
) -> PlaitResult<RewriteConfig> {
    let mut config = match file {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => RewriteConfig::default(),
    };
    if let Some(factor) = divergence_factor {
        config.divergence_factor = factor;
    }
    Ok(config)
}
