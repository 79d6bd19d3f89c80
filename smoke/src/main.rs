// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Smoke Runner
//!
//! Entry point for the `strata-smoke` binary. Parses CLI arguments,
//! initializes logging, opens the selected slab store and runs seeded
//! round-trip workloads against it.
//!
//! - `run`     — run one seeded workload and print a report
//! - `version` — print build version information

mod cli;
mod logging;
mod runner;

use anyhow::{Context, Result};
use clap::Parser;

use strata_runtime::config::RuntimeConfig;
use strata_runtime::storage::{InMemorySlabStorage, SlabStorage, SledSlabStorage};
use strata_runtime::Session;

use cli::{Backend, Commands, SmokeCli};

fn main() -> Result<()> {
    let cli = SmokeCli::parse();

    match cli.command {
        Commands::Run(args) => run_workload(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn run_workload(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format);

    let seed = args.seed.unwrap_or_else(rand::random);
    println!("seed: {seed}");

    let config = match &args.config {
        Some(path) => RuntimeConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let storage: Box<dyn SlabStorage> = match (args.backend, &args.data_dir) {
        (Backend::Memory, _) => Box::new(InMemorySlabStorage::new()),
        (Backend::Sled, Some(dir)) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
            Box::new(
                SledSlabStorage::open(dir)
                    .with_context(|| format!("failed to open slab store at {}", dir.display()))?,
            )
        }
        (Backend::Sled, None) => Box::new(
            SledSlabStorage::open_temporary().context("failed to open temporary slab store")?,
        ),
    };

    tracing::info!(
        seed,
        size = args.size,
        kind = ?args.kind,
        backend = ?args.backend,
        max_inline_size = config.max_inline_size,
        "starting smoke run"
    );

    let mut session = Session::new(storage, config);
    let reports = runner::run(&mut session, seed, args.size, args.kind)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "{:<10} size={:<6} peak={} slabs / {} bytes  final={} slabs / {} bytes  ok",
                report.kind,
                report.size,
                report.peak_slabs,
                report.peak_bytes,
                report.final_slabs,
                report.final_bytes,
            );
        }
    }
    Ok(())
}

fn print_version() {
    println!("strata-smoke   {}", env!("CARGO_PKG_VERSION"));
    println!("inline limit   {} bytes", strata_runtime::config::MAX_INLINE_ELEMENT_SIZE);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
