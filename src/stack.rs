//! Per-channel mask volumes.
//!
//! Every slice is masked on its own; the volume is then restricted to the
//! subject's depth window. A window that does not fit the stack is an error,
//! never clamped, because it means the directory does not hold what the
//! subject table says it should.

use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Axis;

use crate::common::{ChannelStack, DepthWindow, MaskVolume};
use crate::config::MaskConfig;
use crate::error::{ColocError, Result};
use crate::mask::build_mask;
use crate::source::read_slice;

/// Checks that `window` selects at least one of `slices` slices.
pub fn check_window(window: DepthWindow, slices: usize, origin: &Path) -> Result<()> {
    if slices == 0 {
        return Err(ColocError::EmptyStack {
            pattern: origin.display().to_string(),
        });
    }
    if window.is_empty() || window.hi > slices {
        return Err(ColocError::DepthWindow {
            path: origin.to_path_buf(),
            window,
            slices,
        });
    }
    Ok(())
}

/// Reads and masks the windowed slices of one channel directory.
///
/// Only slices inside the window are decoded; each is dropped as soon as its
/// mask is stored.
pub fn mask_files(paths: &[PathBuf], window: DepthWindow, config: &MaskConfig) -> Result<MaskVolume> {
    let origin = channel_origin(paths, config);
    check_window(window, paths.len(), &origin)?;

    let mut volume: Option<MaskVolume> = None;
    for (i, path) in paths[window.lo..window.hi].iter().enumerate() {
        let slice = read_slice(path)?;
        let mask = build_mask(&slice.view(), config);
        let volume = volume.get_or_insert_with(|| {
            MaskVolume::from_elem((window.len(), mask.nrows(), mask.ncols()), false)
        });
        let expected = (volume.len_of(Axis(1)), volume.len_of(Axis(2)));
        if mask.dim() != expected {
            return Err(ColocError::ShapeMismatch {
                left: vec![expected.0, expected.1],
                right: vec![mask.nrows(), mask.ncols()],
            });
        }
        volume.index_axis_mut(Axis(0), i).assign(&mask);
        debug!(
            "{}: {} foreground pixels",
            path.display(),
            mask.iter().filter(|m| **m).count()
        );
    }
    // the window is non-empty, so at least one slice was read
    volume.ok_or(ColocError::EmptyStack {
        pattern: origin.display().to_string(),
    })
}

/// Reads the windowed slices of one channel directory as raw intensities.
pub fn load_stack(paths: &[PathBuf], window: DepthWindow, origin: &Path) -> Result<ChannelStack> {
    check_window(window, paths.len(), origin)?;
    let mut stack: Option<ChannelStack> = None;
    for (i, path) in paths[window.lo..window.hi].iter().enumerate() {
        let slice = read_slice(path)?;
        let stack = stack.get_or_insert_with(|| {
            ChannelStack::zeros((window.len(), slice.nrows(), slice.ncols()))
        });
        let expected = (stack.len_of(Axis(1)), stack.len_of(Axis(2)));
        if slice.dim() != expected {
            return Err(ColocError::ShapeMismatch {
                left: vec![expected.0, expected.1],
                right: vec![slice.nrows(), slice.ncols()],
            });
        }
        stack.index_axis_mut(Axis(0), i).assign(&slice);
    }
    stack.ok_or(ColocError::EmptyStack {
        pattern: origin.display().to_string(),
    })
}

fn channel_origin(paths: &[PathBuf], config: &MaskConfig) -> PathBuf {
    paths
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.dir_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use tempfile::tempdir;

    fn write_slices(dir: &Path, n: usize, pixel: impl Fn(usize, u32, u32) -> u16) -> Vec<PathBuf> {
        (0..n)
            .map(|z| {
                let path = dir.join(format!("slice_z{:03}.tif", z));
                ImageBuffer::<Luma<u16>, Vec<u16>>::from_fn(16, 16, |x, y| Luma([pixel(z, x, y)]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn window_keeps_requested_slices() {
        let dir = tempdir().unwrap();
        let paths = write_slices(dir.path(), 400, |z, _, _| z as u16);
        let stack = load_stack(&paths, DepthWindow::new(140, 305), dir.path()).unwrap();
        assert_eq!(stack.dim(), (165, 16, 16));
        assert!(stack.index_axis(Axis(0), 0).iter().all(|v| *v == 140));
        assert!(stack.index_axis(Axis(0), 164).iter().all(|v| *v == 304));
    }

    #[test]
    fn window_past_end_is_an_error() {
        let paths: Vec<PathBuf> = (0..10).map(|z| PathBuf::from(format!("GFP/s{z}.tif"))).collect();
        let err = mask_files(&paths, DepthWindow::new(5, 11), &MaskConfig::signal()).unwrap_err();
        assert!(matches!(err, ColocError::DepthWindow { slices: 10, .. }));
        let err = load_stack(&paths, DepthWindow::new(4, 4), Path::new("GFP")).unwrap_err();
        assert!(matches!(err, ColocError::DepthWindow { .. }));
    }

    #[test]
    fn empty_stack_is_an_error() {
        let err = mask_files(&[], DepthWindow::new(0, 1), &MaskConfig::signal()).unwrap_err();
        assert!(matches!(err, ColocError::EmptyStack { .. }));
    }

    #[test]
    fn masked_stack_matches_windowed_shape() {
        let dir = tempdir().unwrap();
        let paths = write_slices(dir.path(), 6, |_, x, y| {
            if (5..9).contains(&x) && (5..9).contains(&y) {
                3000
            } else {
                50
            }
        });
        let config = MaskConfig {
            min_object_size: 4,
            ..MaskConfig::marker()
        };
        let volume = mask_files(&paths, DepthWindow::new(1, 4), &config).unwrap();
        assert_eq!(volume.dim(), (3, 16, 16));
        for slice in volume.axis_iter(Axis(0)) {
            assert_eq!(slice.iter().filter(|m| **m).count(), 16);
        }
    }

    #[test]
    fn slices_of_different_size_are_rejected() {
        let dir = tempdir().unwrap();
        let mut paths = write_slices(dir.path(), 2, |_, _, _| 7);
        let odd = dir.path().join("slice_z002.tif");
        ImageBuffer::<Luma<u16>, Vec<u16>>::from_pixel(8, 16, Luma([7]))
            .save(&odd)
            .unwrap();
        paths.push(odd);
        let err = load_stack(&paths, DepthWindow::new(0, 3), dir.path()).unwrap_err();
        assert!(matches!(err, ColocError::ShapeMismatch { .. }));
    }
}
