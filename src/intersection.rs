//! Intersection of the two channel masks and its on-disk form.
//!
//! The intersection is stored as a gzipped NIfTI volume of 0/1 bytes. Its
//! depth axis is relative to the depth window it was computed with, and the
//! window's lower bound is written as the translation of that axis so the
//! volume can be placed back into the full stack without the configuration.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::{Matrix4, Point4};
use ndarray::{ArrayView3, Ix3, Zip};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::common::MaskVolume;
use crate::config::IntersectionConfig;
use crate::error::{ColocError, Result};
use crate::labeling;

/// Voxel-wise AND of two masks followed by small-object removal in 3-D.
///
/// Both inputs are consumed; only the result stays in memory.
pub fn intersect(
    signal: MaskVolume,
    marker: MaskVolume,
    config: &IntersectionConfig,
) -> Result<MaskVolume> {
    if signal.dim() != marker.dim() {
        return Err(ColocError::ShapeMismatch {
            left: signal.shape().to_vec(),
            right: marker.shape().to_vec(),
        });
    }
    let mut joint = signal;
    Zip::from(&mut joint).and(&marker).for_each(|a, &b| *a = *a && b);
    drop(marker);

    let removed = labeling::remove_small_objects(
        joint.view_mut(),
        config.min_object_size,
        config.connectivity,
    );
    debug!(
        "Intersection keeps {} voxels, dropped {} small components",
        joint.iter().filter(|v| **v).count(),
        removed
    );
    Ok(joint)
}

/// An intersection volume read back from disk.
#[derive(Debug)]
pub struct StoredIntersection {
    pub volume: MaskVolume,
    /// Lower bound of the depth window the volume was cut from.
    pub window_lo: usize,
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.strip_suffix(".nii.gz").unwrap_or(&name);
    path.with_file_name(format!("{stem}.tmp.nii.gz"))
}

/// Writes `volume` as 0/1 bytes. The file only appears once it is complete.
pub fn save_volume(path: &Path, volume: &ArrayView3<bool>, window_lo: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ColocError::io(parent, e))?;
    }
    let data = volume.mapv(u8::from);

    let mut affine = Matrix4::<f64>::identity();
    affine[(0, 3)] = window_lo as f64;
    let mut header = NiftiHeader::default();
    header.set_affine(&affine);

    let tmp = temp_path(path);
    WriterOptions::new(&tmp)
        .reference_header(&header)
        .write_nifti(&data)
        .map_err(|source| ColocError::Nifti {
            path: tmp.clone(),
            source,
        })?;
    fs::rename(&tmp, path).map_err(|e| ColocError::io(path, e))?;
    debug!("Wrote {} ({:?})", path.display(), volume.dim());
    Ok(())
}

/// Reads a volume written by [`save_volume`]. Any nonzero voxel is foreground.
pub fn load_volume(path: &Path) -> Result<StoredIntersection> {
    let nifti_error = |source: nifti::error::NiftiError| ColocError::Nifti {
        path: path.to_path_buf(),
        source,
    };
    let obj = ReaderOptions::new().read_file(path).map_err(nifti_error)?;
    let origin = obj.header().affine::<f64>() * Point4::new(0.0, 0.0, 0.0, 1.0);
    let data = obj.into_volume().into_ndarray::<u8>().map_err(nifti_error)?;
    let shape = data.shape().to_vec();
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| ColocError::NotAVolume {
            path: path.to_path_buf(),
            shape,
        })?;

    Ok(StoredIntersection {
        volume: data.mapv(|v| v != 0),
        window_lo: origin[0].round().max(0.0) as usize,
    })
}
