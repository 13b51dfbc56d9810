//! Options and start-up shared by the command line tools.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use log::info;

use crate::logging::setup_logging;
use crate::pipeline::{prepare, run_batch, BatchSummary, Stage};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// the directory holding the Fish*/Timepoint*/Pos* tree
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// where intersections and images are written
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// a YAML file overriding the built-in parameters and subject table
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// only process this subject (repeatable), e.g. -s Fish1 -s Fish3
    #[arg(short, long = "subject")]
    pub subjects: Vec<String>,

    /// log filter, e.g. info or colocnii=debug
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// directory for the rotating log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

/// Sets up logging, loads the configuration and runs `stage` over the batch.
pub fn run(args: &BatchArgs, stage: Stage) -> anyhow::Result<BatchSummary> {
    let _logger = setup_logging(&args.log_level, &args.log_dir)
        .with_context(|| format!("could not start logging with '{}'", args.log_level))?;

    let (config, acquisitions) = prepare(&args.root, args.config.as_deref(), &args.subjects)
        .context("could not prepare the batch")?;
    info!(
        "Running {:?} on {} acquisitions, writing to {}",
        stage,
        acquisitions.len(),
        args.output.display()
    );
    Ok(run_batch(&acquisitions, &config, &args.output, stage))
}

/// Exits with status -2 after printing `e`, the way every tool reports failure.
pub fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("Error! {}", e);
    std::process::exit(-2);
}

/// One `Error!` line per acquisition that did not make it through the batch.
pub fn failure_lines(summary: &BatchSummary) -> Vec<String> {
    summary
        .failed
        .iter()
        .map(|(id, reason)| format!("Error! {}: {}", id, reason))
        .collect()
}

/// Prints the outcome of a batch and exits with status -2 if anything failed.
pub fn finish(summary: &BatchSummary) {
    println!("{}", summary);
    if summary.is_success() {
        return;
    }
    for line in failure_lines(summary) {
        eprintln!("{}", line);
    }
    std::process::exit(-2);
}
