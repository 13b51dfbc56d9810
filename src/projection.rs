//! Maximum-intensity projections and the per-region inspection image.
//!
//! Each region is rendered as a 2x2 grid. The top row shows full-frame MIPs of
//! the signal and marker channels over the region's depth extent, tinted where
//! the intersection MIP is set and marked with a rectangle. The bottom row
//! shows the exact region crop of both channels at the region's first slice,
//! enlarged by an integer factor.

use std::collections::HashMap;
use std::fs;
use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::debug;
use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis, Zip};

use crate::common::{BoundingBox, MaskSlice};
use crate::error::{ColocError, Result};

/// Pixels between panels and around the grid.
const GAP: u32 = 8;
const BACKGROUND: Rgb<u8> = Rgb([32, 32, 32]);
const RECT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const OVERLAY_ALPHA: f32 = 0.2;

/// Element-wise maximum over the slices in `depth`.
///
/// Panics if `depth` is empty or out of bounds; callers check boxes with
/// [`project_region`].
pub fn max_projection<T: Copy + PartialOrd>(
    volume: &ArrayView3<T>,
    depth: RangeInclusive<usize>,
) -> Array2<T> {
    let (first, last) = (*depth.start(), *depth.end());
    let mut out = volume.index_axis(Axis(0), first).to_owned();
    for slice in volume.slice(s![first + 1..=last, .., ..]).axis_iter(Axis(0)) {
        Zip::from(&mut out).and(&slice).for_each(|m, &v| {
            if v > *m {
                *m = v;
            }
        });
    }
    out
}

/// The box's exact in-plane extent at depth `z`.
pub fn crop<T: Clone>(volume: &ArrayView3<T>, z: usize, bbox: &BoundingBox) -> Array2<T> {
    volume
        .slice(s![z, bbox.y_range(), bbox.x_range()])
        .to_owned()
}

/// Translates a box's window-relative depth into absolute stack indices.
pub fn absolute_depth_range(bbox: &BoundingBox, window_lo: usize) -> Range<usize> {
    (bbox.z_min + window_lo)..(bbox.z_max + 1 + window_lo)
}

/// File name of the inspection image for an absolute depth range.
///
/// `occurrence` counts earlier regions with the same range; the first keeps
/// the bare name, later ones get `_2`, `_3`, ...
pub fn artifact_name(depth: &Range<usize>, occurrence: usize) -> String {
    match occurrence {
        0 => format!("image_{}-{}.png", depth.start, depth.end),
        n => format!("image_{}-{}_{}.png", depth.start, depth.end, n + 1),
    }
}

/// One distinct file name per box, in box order.
pub fn artifact_names(boxes: &[BoundingBox], window_lo: usize) -> Vec<String> {
    let mut seen: HashMap<Range<usize>, usize> = HashMap::new();
    boxes
        .iter()
        .map(|bbox| {
            let depth = absolute_depth_range(bbox, window_lo);
            let count = seen.entry(depth.clone()).or_insert(0);
            let name = artifact_name(&depth, *count);
            *count += 1;
            name
        })
        .collect()
}

/// Rectangle drawn on the full-frame panels: anchored at the box's top-left
/// corner, twice the box's width and height.
pub fn enlarged_rect(bbox: &BoundingBox) -> Rect {
    Rect::at(bbox.x_min as i32, bbox.y_min as i32)
        .of_size(2 * bbox.width() as u32, 2 * bbox.height() as u32)
}

/// Everything drawn for one region.
#[derive(Debug, Clone)]
pub struct RegionView {
    pub signal_mip: Array2<u16>,
    pub marker_mip: Array2<u16>,
    pub mask_mip: MaskSlice,
    pub signal_crop: Array2<u16>,
    pub marker_crop: Array2<u16>,
    pub mask_crop: MaskSlice,
}

/// Builds the projections and crops of `bbox`.
///
/// The three volumes must share a shape and the box must lie inside it.
pub fn project_region(
    signal: &ArrayView3<u16>,
    marker: &ArrayView3<u16>,
    mask: &ArrayView3<bool>,
    bbox: &BoundingBox,
) -> Result<RegionView> {
    for other in [marker.shape(), mask.shape()] {
        if other != signal.shape() {
            return Err(ColocError::ShapeMismatch {
                left: signal.shape().to_vec(),
                right: other.to_vec(),
            });
        }
    }
    let (depth, rows, cols) = signal.dim();
    let fits = bbox.z_min <= bbox.z_max
        && bbox.y_min <= bbox.y_max
        && bbox.x_min <= bbox.x_max
        && bbox.z_max < depth
        && bbox.y_max < rows
        && bbox.x_max < cols;
    if !fits {
        return Err(ColocError::ShapeMismatch {
            left: signal.shape().to_vec(),
            right: vec![bbox.z_max + 1, bbox.y_max + 1, bbox.x_max + 1],
        });
    }

    Ok(RegionView {
        signal_mip: max_projection(signal, bbox.z_range()),
        marker_mip: max_projection(marker, bbox.z_range()),
        mask_mip: max_projection(mask, bbox.z_range()),
        signal_crop: crop(signal, bbox.z_min, bbox),
        marker_crop: crop(marker, bbox.z_min, bbox),
        mask_crop: crop(mask, bbox.z_min, bbox),
    })
}

/// Min-max stretch of 16-bit intensities into an 8-bit gray image.
fn to_gray(img: &ArrayView2<u16>) -> RgbImage {
    let (rows, cols) = img.dim();
    let (lo, hi) = img
        .iter()
        .fold((u16::MAX, u16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = hi.saturating_sub(lo) as f32;
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = img[[y as usize, x as usize]];
        let g = if span > 0.0 {
            ((v - lo) as f32 / span * 255.0).round() as u8
        } else {
            0
        };
        Rgb([g, g, g])
    })
}

fn tint(panel: &mut RgbImage, mask: &ArrayView2<bool>) {
    for ((y, x), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        let px = panel.get_pixel_mut(x as u32, y as u32);
        for (c, o) in px.0.iter_mut().zip(OVERLAY_COLOR.0) {
            *c = ((1.0 - OVERLAY_ALPHA) * *c as f32 + OVERLAY_ALPHA * o as f32).round() as u8;
        }
    }
}

fn frame_panel(mip: &ArrayView2<u16>, mask: &ArrayView2<bool>, bbox: &BoundingBox) -> RgbImage {
    let mut panel = to_gray(mip);
    tint(&mut panel, mask);
    draw_hollow_rect_mut(&mut panel, enlarged_rect(bbox), RECT_COLOR);
    panel
}

/// Largest integer factor that keeps a `(rows, cols)` crop inside the frame.
fn zoom_factor(crop: (usize, usize), frame: (usize, usize)) -> u32 {
    let by_rows = frame.0 / crop.0.max(1);
    let by_cols = frame.1 / crop.1.max(1);
    by_rows.min(by_cols).max(1) as u32
}

fn crop_panel(crop: &ArrayView2<u16>, mask: &ArrayView2<bool>, frame: (usize, usize)) -> RgbImage {
    let mut panel = to_gray(crop);
    tint(&mut panel, mask);
    let factor = zoom_factor(crop.dim(), frame);
    imageops::resize(
        &panel,
        panel.width() * factor,
        panel.height() * factor,
        FilterType::Nearest,
    )
}

/// Draws the 2x2 inspection grid for one region.
pub fn render_region(view: &RegionView, bbox: &BoundingBox) -> RgbImage {
    let frame = view.signal_mip.dim();
    let (rows, cols) = (frame.0 as u32, frame.1 as u32);
    let mut canvas = RgbImage::from_pixel(3 * GAP + 2 * cols, 3 * GAP + 2 * rows, BACKGROUND);

    let panels = [
        frame_panel(&view.signal_mip.view(), &view.mask_mip.view(), bbox),
        frame_panel(&view.marker_mip.view(), &view.mask_mip.view(), bbox),
        crop_panel(&view.signal_crop.view(), &view.mask_crop.view(), frame),
        crop_panel(&view.marker_crop.view(), &view.mask_crop.view(), frame),
    ];
    for (i, panel) in panels.iter().enumerate() {
        let (col, row) = ((i % 2) as u32, (i / 2) as u32);
        let x = GAP + col * (cols + GAP);
        let y = GAP + row * (rows + GAP);
        imageops::overlay(&mut canvas, panel, x as i64, y as i64);
    }
    canvas
}

/// Renders `view` and writes it into `dir` as `name`.
pub fn save_region(
    dir: &Path,
    view: &RegionView,
    bbox: &BoundingBox,
    name: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| ColocError::io(dir, e))?;
    let path = dir.join(name);
    render_region(view, bbox)
        .save(&path)
        .map_err(|source| ColocError::Image {
            path: path.clone(),
            source,
        })?;
    debug!("Saved {} for box {}", path.display(), bbox);
    Ok(path)
}
