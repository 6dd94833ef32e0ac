//! Command-line interface for the plait driver.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use plait::PipelineKind;

#[derive(Parser)]
#[command(name = "plait")]
#[command(about = "Import, type and lower tensor-program graphs", long_about = None)]
pub struct Cli {
    /// Raise log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import a graph record, run a pipeline on it and print the result
    Run {
        /// Path to the JSON graph record
        file: PathBuf,

        /// Pipeline to run after import
        #[arg(long, value_enum, default_value_t = PipelineKind::Canonicalize)]
        pipeline: PipelineKind,

        /// Rewrites allowed per initial node before a run counts as divergent
        #[arg(long)]
        divergence_factor: Option<usize>,

        /// JSON file holding a rewrite configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Annotate every node with its inferred type
        #[arg(long)]
        print_types: bool,
    },
    /// List registered operations and foreign op ids
    Ops,
}
