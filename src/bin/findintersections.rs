//! Quick commandline utility to compute and store the GFP/RFP intersection
//! volume of every acquisition.
//!
//! Each volume is written to
//! `<output>/intersection_mask_arrays/intersection_mask_array_<Fish>-<Timepoint>-<Pos>.nii.gz`
//! for `cropevents` to pick up later.

use clap::Parser;

use colocnii::cli::{fail, finish, run, BatchArgs};
use colocnii::pipeline::Stage;

#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    #[command(flatten)]
    batch: BatchArgs,
}

fn main() {
    let cli = Args::parse();
    let summary = run(&cli.batch, Stage::Find).unwrap_or_else(|e| fail(format!("{:#}", e)));
    finish(&summary);
}
