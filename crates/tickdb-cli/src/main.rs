//! # tickdb
//!
//! Command-line driver for the TickDB simulator.
//!
//! ## Usage
//!
//! ```bash
//! # Run a script, transcript on stdout
//! tickdb tests/input1.txt
//!
//! # Transcript to a file as JSON lines, with a metrics summary
//! tickdb tests/input1.txt --output out.jsonl --format json --metrics
//!
//! # Read the script from stdin
//! cat script.txt | tickdb -
//! ```

mod cli;
mod config;
mod error;
mod transcript;

use anyhow::{Context, Result};
use cli::Cli;
use config::Config;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tickdb_core::Coordinator;
use tickdb_metrics::{Metrics, MetricsSnapshot};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transcript::{Tee, TranscriptWriter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    config.apply(&cli);

    // Initialize tracing; the transcript owns stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let script = read_script(cli.input.as_deref())?;

    let metrics = Metrics::shared();
    let mut coordinator = Coordinator::new().with_metrics(Arc::clone(&metrics));

    let out: Box<dyn Write> = match &config.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating transcript {}", path.display()))?;
            let file = BufWriter::new(file);
            if config.echo {
                Box::new(Tee::new(file, io::stdout()))
            } else {
                Box::new(file)
            }
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut transcript = TranscriptWriter::new(out, config.format);
    let ticks = coordinator.run_script(&script, &mut transcript);
    transcript.finish().context("writing transcript")?;

    tracing::info!(
        ticks,
        live = coordinator.live_transactions(),
        blocked = coordinator.blocked().len(),
        "run finished"
    );

    if config.metrics {
        let snapshot = MetricsSnapshot::from_metrics(&metrics);
        eprintln!("{}", snapshot.to_json()?);
    }

    Ok(())
}

fn read_script(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display())),
        _ => {
            let mut script = String::new();
            io::stdin()
                .read_to_string(&mut script)
                .context("reading script from stdin")?;
            Ok(script)
        }
    }
}
