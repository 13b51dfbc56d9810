use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// A single grayscale slice, rows x columns.
pub type GraySlice = Array2<u16>;
/// An ordered stack of grayscale slices, depth x rows x columns.
pub type ChannelStack = Array3<u16>;
/// A binary foreground mask for one slice.
pub type MaskSlice = Array2<bool>;
/// A binary foreground mask for a stack, depth x rows x columns.
pub type MaskVolume = Array3<bool>;

// set up enums and structs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Signal,
    Marker,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Signal => write!(f, "signal"),
            Channel::Marker => write!(f, "marker"),
        }
    }
}

/// Half-open range `[lo, hi)` of depth indices that may contain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthWindow {
    pub lo: usize,
    pub hi: usize,
}

impl DepthWindow {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for DepthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

/// Axis-aligned box around one connected region of a volume.
///
/// Every `*_max` field is the last index that still belongs to the region,
/// so a single voxel has `min == max` on all three axes. Use the range helpers
/// when slicing arrays instead of doing the `+ 1` by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub z_min: usize,
    pub y_min: usize,
    pub x_min: usize,
    pub z_max: usize,
    pub y_max: usize,
    pub x_max: usize,
}

impl BoundingBox {
    pub fn new(
        z_min: usize,
        y_min: usize,
        x_min: usize,
        z_max: usize,
        y_max: usize,
        x_max: usize,
    ) -> Self {
        Self {
            z_min,
            y_min,
            x_min,
            z_max,
            y_max,
            x_max,
        }
    }

    /// A box covering only the voxel at `(z, y, x)`.
    pub fn at(z: usize, y: usize, x: usize) -> Self {
        Self::new(z, y, x, z, y, x)
    }

    /// Grows the box so that it contains `(z, y, x)`.
    pub fn include(&mut self, z: usize, y: usize, x: usize) {
        self.z_min = self.z_min.min(z);
        self.y_min = self.y_min.min(y);
        self.x_min = self.x_min.min(x);
        self.z_max = self.z_max.max(z);
        self.y_max = self.y_max.max(y);
        self.x_max = self.x_max.max(x);
    }

    pub fn z_range(&self) -> RangeInclusive<usize> {
        self.z_min..=self.z_max
    }

    pub fn y_range(&self) -> RangeInclusive<usize> {
        self.y_min..=self.y_max
    }

    pub fn x_range(&self) -> RangeInclusive<usize> {
        self.x_min..=self.x_max
    }

    pub fn depth(&self) -> usize {
        self.z_max - self.z_min + 1
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min + 1
    }

    pub fn width(&self) -> usize {
        self.x_max - self.x_min + 1
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z {}..={}, y {}..={}, x {}..={}",
            self.z_min, self.z_max, self.y_min, self.y_max, self.x_min, self.x_max
        )
    }
}

/// Which fish, timepoint and stage position a stack came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcquisitionId {
    pub subject: String,
    pub timepoint: String,
    pub position: String,
}

impl AcquisitionId {
    pub fn new(subject: &str, timepoint: &str, position: &str) -> Self {
        Self {
            subject: subject.to_string(),
            timepoint: timepoint.to_string(),
            position: position.to_string(),
        }
    }

    /// Key used to name every artifact of this acquisition.
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.subject, self.timepoint, self.position)
    }
}

impl fmt::Display for AcquisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
