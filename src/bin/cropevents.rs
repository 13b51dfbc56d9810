//! Quick commandline utility to render every region of the intersection
//! volumes stored by `findintersections`.
//!
//! One 4-panel PNG per region lands in `<output>/<Fish>-<Timepoint>-<Pos>_images/`,
//! named `image_<first>-<last + 1>.png` after the absolute slice range.

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
    let summary = run(&cli.batch, Stage::Crop).unwrap_or_else(|e| fail(format!("{:#}", e)));
    finish(&summary);
}
