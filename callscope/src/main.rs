//! # callscope - Main Entry Point
//!
//! Replays a recorded call trace through the context engine, prints the
//! most expensive calling contexts and optionally exports the full report.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;

use callscope::cli::Args;
use callscope::export::ContextExporter;
use callscope::replay::Replayer;
use callscope::session::Session;
use callscope::symbolization::{parse_memory_maps, DebugInfoSource, DwarfSource, NullSource};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also end up here
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            e.print().ok();
            std::process::exit(code);
        }
    };

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

/// Debug-info source for `call_addr` events.
fn open_source(args: &Args) -> Result<Box<dyn DebugInfoSource>> {
    let Some(ref binary) = args.binary else {
        return Ok(Box::new(NullSource));
    };

    let mut source = DwarfSource::open(binary)
        .with_context(|| format!("Failed to load debug info from {}", binary.display()))?;

    if let Some(pid) = args.pid {
        let binary_path = std::fs::canonicalize(binary)
            .with_context(|| format!("Failed to resolve path: {}", binary.display()))?;
        match parse_memory_maps(pid, &binary_path.to_string_lossy()) {
            Ok(range) => {
                info!("Found memory range: 0x{:x} - 0x{:x}", range.start, range.end);
                source.rebase(range);
            }
            Err(e) => warn!("Failed to get memory range: {e}. Using link-time addresses."),
        }
    }

    Ok(Box::new(source))
}

fn run(args: &Args) -> Result<()> {
    let quiet = args.quiet;
    let config = args.engine_config();

    if !quiet {
        println!("callscope v{}", env!("CARGO_PKG_VERSION"));
        println!("trace: {}", args.trace.display());
        println!("depth: {}", config.max_depth);
    }

    let source = open_source(args)?;
    let mut replayer = Replayer::new(Session::new(config), source);

    if let Some(ref map) = args.instr_map {
        let named = replayer.instrs_mut().load_names(map)?;
        if !quiet {
            println!("instruction names: {named}");
        }
    }

    let summary = replayer
        .replay_file(&args.trace)
        .with_context(|| format!("Failed to replay {}", args.trace.display()))?;

    if !quiet {
        println!(
            "replayed: {} ops, {} calls, {} threads",
            summary.ops, summary.calls, summary.threads
        );
        if summary.unattributed_cost > 0 {
            println!("unattributed cost: {}", summary.unattributed_cost);
        }
        println!("{}", replayer.session().statistics());

        let hotspots = replayer.costs().to_hotspots(replayer.session());
        if !hotspots.is_empty() {
            println!("\nHOTSPOTS");
            for hotspot in hotspots.iter().take(args.top) {
                println!(
                    "  {:>6.2}%  {:>10}  {:>6} calls  {}",
                    hotspot.percentage,
                    hotspot.cost,
                    hotspot.calls,
                    hotspot.label()
                );
            }
        }
    }

    if let Some(ref export_path) = args.export {
        replayer.describe_instrs();

        let file = File::create(export_path).context("Failed to create report output file")?;
        let writer = BufWriter::new(file);
        ContextExporter::new(replayer.session(), replayer.costs())
            .with_instrs(replayer.instrs())
            .export(writer)
            .context("Failed to export context report")?;

        if !quiet {
            println!("saved: {}", export_path.display());
        }
    }

    Ok(())
}
