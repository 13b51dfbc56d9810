//! Co-localization events between two fluorescence z-stacks.
//!
//! Every slice of both channels is thresholded at median + 3 standard
//! deviations and cleaned morphologically. The two mask volumes are
//! intersected, small components are dropped, and each remaining region is
//! cropped and projected for inspection.

pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod intersection;
pub mod labeling;
pub mod logging;
pub mod mask;
pub mod morphology;
pub mod pipeline;
pub mod projection;
pub mod source;
pub mod stack;
pub mod threshold;

pub use error::{ColocError, Result};
