//! Grayscale slice to cleaned binary mask.

use ndarray::{Array2, ArrayView2};

use crate::common::MaskSlice;
use crate::config::MaskConfig;
use crate::morphology;
use crate::threshold::find_threshold;

/// Marks every sample at or above `threshold` as foreground.
pub fn binarize(slice: &ArrayView2<u16>, threshold: f64) -> Array2<bool> {
    slice.mapv(|v| v as f64 >= threshold)
}

/// Builds the mask of one slice: threshold, smooth, drop small objects, fill holes.
pub fn build_mask(slice: &ArrayView2<u16>, config: &MaskConfig) -> MaskSlice {
    let threshold = find_threshold(slice);
    let mut mask = binarize(slice, threshold);

    for op in config.recipe.operators() {
        mask = op.apply(&mask.view(), config.structuring_element);
    }

    morphology::remove_small_objects(&mut mask, config.min_object_size, config.connectivity);

    if config.fill_holes {
        mask = morphology::fill_holes(&mask.view());
    }
    mask
}
