//! # CLI Interface
//!
//! Command-line arguments for `strata-smoke`, defined with `clap` derive.
//! Two subcommands: `run` and `version`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;

/// Randomized round-trip runner for the strata value store.
///
/// Builds value trees from a seed, walks them, transfers them to another
/// owner and removes them, checking that the store ends up exactly where it
/// started.
#[derive(Parser, Debug)]
#[command(
    name = "strata-smoke",
    about = "Randomized round-trip runner for the strata value store",
    version,
    propagate_version = true
)]
pub struct SmokeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one seeded workload and print a report.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Which container workload to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkloadKind {
    Array,
    Dictionary,
    Composite,
    All,
}

/// Slab store the session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Memory,
    Sled,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Seed for the value generator. A random seed is drawn when omitted;
    /// it is always printed so the run can be replayed.
    #[arg(long, env = "STRATA_SEED")]
    pub seed: Option<u64>,

    /// Number of top-level entries, elements or fields.
    #[arg(long, default_value_t = 100)]
    pub size: usize,

    #[arg(long, value_enum, default_value_t = WorkloadKind::All)]
    pub kind: WorkloadKind,

    #[arg(long, value_enum, default_value_t = Backend::Memory)]
    pub backend: Backend,

    /// Directory of the sled database. A temporary database is used when
    /// omitted.
    #[arg(long, short = 'd', env = "STRATA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Runtime configuration file (JSON).
    #[arg(long, short = 'c', env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, default_value = "strata_smoke=info,strata_runtime=warn")]
    pub log_level: String,
}
