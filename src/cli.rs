// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `substreams-orchestrator`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "substreams-orchestrator",
    version,
    about = "Plan the parallel backfill of the stores a module depends on.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the manifest (TOML).
    ///
    /// Default: `substreams.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "substreams.toml")]
    pub manifest: PathBuf,

    /// Output module to plan the backfill for.
    #[arg(long, value_name = "NAME")]
    pub module: String,

    /// Block the module should start streaming from.
    ///
    /// Defaults to the module's `initial_block`.
    #[arg(long, short = 's', value_name = "BLOCK")]
    pub start_block: Option<u64>,

    /// Local state store directory; overrides `[config].state_store`.
    #[arg(long, value_name = "DIR")]
    pub state_store: Option<PathBuf>,

    /// Also print the module graph as a Mermaid flowchart.
    #[arg(long)]
    pub mermaid: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SUBSTREAMS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
