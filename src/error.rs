use std::path::PathBuf;

use thiserror::Error;

use crate::common::DepthWindow;

pub type Result<T> = std::result::Result<T, ColocError>;

/// Everything that can stop an acquisition from being processed.
#[derive(Debug, Error)]
pub enum ColocError {
    #[error("Depth window {window} does not fit a stack of {slices} slices in '{path}'")]
    DepthWindow {
        path: PathBuf,
        window: DepthWindow,
        slices: usize,
    },

    #[error("No slices matching '{pattern}' were found")]
    EmptyStack { pattern: String },

    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("No subject table entry for: {}", subjects.join(", "))]
    MissingSubjects { subjects: Vec<String> },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read or write image '{path}': {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to read or write volume '{path}': {source}")]
    Nifti {
        path: PathBuf,
        source: nifti::error::NiftiError,
    },

    #[error("'{path}' holds a volume of shape {shape:?}, expected three dimensions")]
    NotAVolume { path: PathBuf, shape: Vec<usize> },

    #[error("Bad file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Failed to parse configuration '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yml::Error,
    },
}

impl ColocError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ColocError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        ColocError::InvalidConfig {
            reason: reason.into(),
        }
    }
}
