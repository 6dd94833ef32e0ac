//! plait CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use plait::{PlaitResult, import_file, rewrite_config};
use plait_dialect::standard_registry;
use plait_ir::{IrError, Pass, print_graph};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> PlaitResult<()> {
    let registry = standard_registry().map_err(IrError::from)?;

    match command {
        Command::Run {
            file,
            pipeline,
            divergence_factor,
            config,
            print_types,
        } => {
            let config = rewrite_config(config.as_deref(), divergence_factor)?;
            let mut graph = import_file(&file, registry)?;
            if print_types {
                graph.infer_types()?;
            }
            println!("=== Imported: {} ===", file.display());
            print!("{}", print_graph(&graph, print_types));

            let pipeline = pipeline.build(config);
            let changed = pipeline.run(&mut graph)?;
            tracing::info!(pipeline = pipeline.name(), changed, "pipeline finished");

            // Lowered graphs must still type.
            graph.infer_types()?;
            println!("=== After {} ===", pipeline.name());
            print!("{}", print_graph(&graph, print_types));
        }
        Command::Ops => {
            for info in registry.ops() {
                println!("{:<20} {} operand(s)", info.name.to_string(), info.arity);
            }
            println!();
            for id in registry.foreign_ids() {
                println!("{id}");
            }
        }
    }
    Ok(())
}
