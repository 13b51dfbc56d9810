//! Drives acquisitions through the two stages.
//!
//! Stage one masks both channels, intersects them and stores the
//! intersection. Stage two reads it back, finds its regions and renders one
//! image per region. A failing acquisition is logged and skipped; the rest of
//! the batch still runs.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{error, info, warn};
use ndarray::{ArrayView3, Axis};

use crate::common::{AcquisitionId, BoundingBox, Channel, DepthWindow, MaskVolume};
use crate::config::Config;
use crate::error::Result;
use crate::intersection::{intersect, load_volume, save_volume};
use crate::labeling::{bounding_boxes, slice_bounding_boxes, Connectivity};
use crate::projection::{artifact_names, project_region, save_region};
use crate::source::{discover_acquisitions, Acquisition};
use crate::stack::{load_stack, mask_files};

/// Directory under the output root holding every stored intersection.
pub const INTERSECTION_DIR: &str = "intersection_mask_arrays";

pub fn intersection_path(output: &Path, id: &AcquisitionId) -> PathBuf {
    output
        .join(INTERSECTION_DIR)
        .join(format!("intersection_mask_array_{}.nii.gz", id.key()))
}

pub fn images_dir(output: &Path, id: &AcquisitionId) -> PathBuf {
    output.join(format!("{}_images", id.key()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Compute and store intersections only.
    Find,
    /// Render regions of previously stored intersections.
    Crop,
    /// Both, without reading the intersection back.
    All,
}

/// Masks both channels of `acq` inside its depth window and intersects them.
pub fn find_intersection(acq: &Acquisition, config: &Config) -> Result<MaskVolume> {
    let window = config.subject(&acq.id.subject)?.depth_window;
    let signal = mask_files(
        &acq.slices(config, Channel::Signal)?,
        window,
        &config.signal,
    )?;
    let marker = mask_files(
        &acq.slices(config, Channel::Marker)?,
        window,
        &config.marker,
    )?;
    intersect(signal, marker, &config.intersection)
}

/// Stage one for a single acquisition. Returns the stored volume and its window.
pub fn run_stage_one(
    acq: &Acquisition,
    config: &Config,
    output: &Path,
) -> Result<(MaskVolume, DepthWindow)> {
    let window = config.subject(&acq.id.subject)?.depth_window;
    info!("{}: masking slices {}", acq.id, window);
    let volume = find_intersection(acq, config)?;
    let path = intersection_path(output, &acq.id);
    save_volume(&path, &volume.view(), window.lo)?;
    info!("{}: stored intersection in {}", acq.id, path.display());
    Ok((volume, window))
}

/// Boxes of the regions of `volume`. Planar connectivities label slice by slice.
pub fn region_boxes(volume: &ArrayView3<bool>, connectivity: Connectivity) -> Vec<BoundingBox> {
    if connectivity.is_planar() {
        slice_bounding_boxes(volume, connectivity)
            .into_iter()
            .map(|(_, b)| b)
            .collect()
    } else {
        bounding_boxes(volume, connectivity)
    }
}

/// Renders every region of `volume`, whose slice 0 is depth `window.lo` of the
/// raw stacks.
pub fn crop_events(
    acq: &Acquisition,
    config: &Config,
    output: &Path,
    volume: &MaskVolume,
    window: DepthWindow,
) -> Result<Vec<PathBuf>> {
    let boxes = region_boxes(&volume.view(), config.intersection.region_connectivity);
    if boxes.is_empty() {
        info!("{}: no co-localization events", acq.id);
        return Ok(Vec::new());
    }
    info!("{}: {} regions", acq.id, boxes.len());

    let signal = load_stack(
        &acq.slices(config, Channel::Signal)?,
        window,
        &acq.channel_dir(config, Channel::Signal),
    )?;
    let marker = load_stack(
        &acq.slices(config, Channel::Marker)?,
        window,
        &acq.channel_dir(config, Channel::Marker),
    )?;

    let dir = images_dir(output, &acq.id);
    let names = artifact_names(&boxes, window.lo);
    let mut written = Vec::with_capacity(boxes.len());
    for (bbox, name) in boxes.iter().zip(&names) {
        let view = project_region(&signal.view(), &marker.view(), &volume.view(), bbox)?;
        written.push(save_region(&dir, &view, bbox, name)?);
    }
    Ok(written)
}

/// Stage two for a single acquisition, starting from the stored intersection.
pub fn run_stage_two(acq: &Acquisition, config: &Config, output: &Path) -> Result<Vec<PathBuf>> {
    let stored = load_volume(&intersection_path(output, &acq.id))?;
    let window = DepthWindow::new(
        stored.window_lo,
        stored.window_lo + stored.volume.len_of(Axis(0)),
    );
    let configured = config.subject(&acq.id.subject)?.depth_window;
    if configured != window {
        warn!(
            "{}: stored intersection covers slices {} but the subject table says {}, using the stored range",
            acq.id, window, configured
        );
    }
    crop_events(acq, config, output, &stored.volume, window)
}

/// Runs `stage` for one acquisition. Returns whether any event was found.
pub fn run_acquisition(
    acq: &Acquisition,
    config: &Config,
    output: &Path,
    stage: Stage,
) -> Result<bool> {
    match stage {
        Stage::Find => {
            let (volume, _) = run_stage_one(acq, config, output)?;
            Ok(volume.iter().any(|v| *v))
        }
        Stage::Crop => Ok(!run_stage_two(acq, config, output)?.is_empty()),
        Stage::All => {
            let (volume, window) = run_stage_one(acq, config, output)?;
            Ok(!crop_events(acq, config, output, &volume, window)?.is_empty())
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub without_events: usize,
    pub failed: Vec<(AcquisitionId, String)>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} without events, {} failed",
            self.processed,
            self.without_events,
            self.failed.len()
        )
    }
}

/// Runs `stage` over every acquisition, one at a time.
pub fn run_batch(
    acquisitions: &[Acquisition],
    config: &Config,
    output: &Path,
    stage: Stage,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for acq in acquisitions {
        match run_acquisition(acq, config, output, stage) {
            Ok(found) => {
                summary.processed += 1;
                if !found {
                    summary.without_events += 1;
                }
            }
            Err(e) => {
                error!("{}: {}", acq.id, e);
                summary.failed.push((acq.id.clone(), e.to_string()));
            }
        }
    }
    info!("Batch finished: {}", summary);
    summary
}

/// Loads the configuration and enumerates the acquisitions of the run.
///
/// Every requested and every discovered subject must be in the subject
/// table; nothing is processed otherwise.
pub fn prepare(
    root: &Path,
    config_path: Option<&Path>,
    subjects: &[String],
) -> Result<(Config, Vec<Acquisition>)> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };
    config.check_subjects(subjects)?;
    let acquisitions = discover_acquisitions(root, &config, subjects)?;
    Ok((config, acquisitions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn artifact_locations() {
        let id = AcquisitionId::new("Fish1", "Timepoint2", "Pos3");
        assert_eq!(
            intersection_path(Path::new("/out"), &id),
            PathBuf::from(
                "/out/intersection_mask_arrays/intersection_mask_array_Fish1-Timepoint2-Pos3.nii.gz"
            )
        );
        assert_eq!(
            images_dir(Path::new("/out"), &id),
            PathBuf::from("/out/Fish1-Timepoint2-Pos3_images")
        );
    }

    #[test]
    fn planar_region_boxes_stay_in_one_slice() {
        let mut v = Array3::from_elem((3, 4, 4), false);
        v[[0, 1, 1]] = true;
        v[[1, 1, 1]] = true;
        assert_eq!(region_boxes(&v.view(), Connectivity::TwentySix).len(), 1);
        let planar = region_boxes(&v.view(), Connectivity::Eight);
        assert_eq!(planar, vec![BoundingBox::at(0, 1, 1), BoundingBox::at(1, 1, 1)]);
    }

    #[test]
    fn failed_acquisitions_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let acquisitions = vec![
            Acquisition {
                id: AcquisitionId::new("Fish1", "Timepoint1", "Pos1"),
                dir: dir.path().join("missing"),
            },
            Acquisition {
                id: AcquisitionId::new("Fish9", "Timepoint1", "Pos1"),
                dir: dir.path().join("missing"),
            },
        ];
        let summary = run_batch(&acquisitions, &Config::default(), dir.path(), Stage::All);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.failed.len(), 2);
        assert!(!summary.is_success());
    }

    #[test]
    fn unknown_requested_subject_stops_preparation() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare(dir.path(), None, &["Fish42".to_string()]).unwrap_err();
        assert!(matches!(err, crate::error::ColocError::MissingSubjects { .. }));
    }
}
