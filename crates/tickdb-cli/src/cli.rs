//! CLI argument parsing for tickdb

use crate::config::Format;
use clap::Parser;
use std::path::PathBuf;

/// Replicated concurrency control and recovery simulator
#[derive(Parser, Debug, Clone)]
#[command(name = "tickdb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Operation script, one tick per line (stdin when omitted or "-")
    pub input: Option<PathBuf>,

    /// Write the transcript to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Transcript format
    #[arg(long, value_enum)]
    pub format: Option<Format>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print a metrics snapshot to stderr after the run
    #[arg(long)]
    pub metrics: bool,

    /// Also copy the transcript to stdout when writing to a file
    #[arg(long)]
    pub echo: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
