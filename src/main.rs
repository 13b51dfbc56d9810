//! Quick commandline utility to find co-localization events in a batch of
//! two-channel z-stacks.
//!
//! Runs both stages by default: the GFP and RFP slices of every
//! Fish*/Timepoint*/Pos* acquisition are thresholded and cleaned, the two
//! masks are intersected and stored, and one inspection image is written per
//! intersecting region.

use clap::Parser;

use colocnii::cli::{fail, finish, run, BatchArgs};
use colocnii::pipeline::Stage;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    #[command(flatten)]
    batch: BatchArgs,

    /// which part of the pipeline to run
    #[arg(long, value_enum, default_value_t = Stage::All)]
    stage: Stage,
}

fn main() {
    let cli = Args::parse();
    let summary = run(&cli.batch, cli.stage).unwrap_or_else(|e| fail(format!("{:#}", e)));
    finish(&summary);
}
