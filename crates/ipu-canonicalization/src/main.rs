use std::fs;
use std::process::ExitCode;

use ipu_canonicalization::{ir::Graph, CanonicalizationPass, HandlerRegistry, Result};
use log::LevelFilter;

/// Canonicalize a JSON graph and write the rewritten graph next to it
fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        eprintln!("Usage: ipu-canonicalize <graph.json> <out.json> [debug-dir]");
        return ExitCode::FAILURE;
    };
    let development = args.next();

    if let Err(err) = ipu_canonicalization::init_log(LevelFilter::Info) {
        eprintln!("Failed to initialize logging: {err}");
    }

    match run(&input, &output, development.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &str, output: &str, development: Option<&str>) -> Result<()> {
    log::info!("Reading {input}");
    let mut graph: Graph = serde_json::from_str(&fs::read_to_string(input)?)?;

    let mut pass = CanonicalizationPass::new();
    if let Some(dir) = development {
        pass.development(dir);
    }
    let report = pass.run(&mut graph, &HandlerRegistry::with_default_handlers())?;

    fs::write(output, serde_json::to_string_pretty(&graph)?)?;
    log::info!(
        "Wrote {output}: {} operations rewritten, {} nodes left",
        report.rewritten,
        graph.len()
    );
    Ok(())
}
