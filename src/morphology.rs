//! Binary morphology on single slices.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::labeling::{self, Connectivity};

/// 3x3 footprint used by every operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringElement {
    /// Centre plus the four edge neighbours.
    #[default]
    Cross,
    /// The full 3x3 square.
    Square,
}

impl StructuringElement {
    fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            StructuringElement::Cross => &[(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)],
            StructuringElement::Square => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 0),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphOp {
    Dilate,
    Erode,
    /// Erosion followed by dilation.
    Open,
    /// Dilation followed by erosion.
    Close,
}

impl MorphOp {
    pub fn apply(&self, mask: &ArrayView2<bool>, se: StructuringElement) -> Array2<bool> {
        match self {
            MorphOp::Dilate => dilate(mask, se),
            MorphOp::Erode => erode(mask, se),
            MorphOp::Open => dilate(&erode(mask, se).view(), se),
            MorphOp::Close => erode(&dilate(mask, se).view(), se),
        }
    }
}

/// A pixel becomes foreground if any pixel under the footprint is foreground.
///
/// Neighbours outside the frame count as background.
pub fn dilate(mask: &ArrayView2<bool>, se: StructuringElement) -> Array2<bool> {
    let (h, w) = mask.dim();
    let offsets = se.offsets();
    Array2::from_shape_fn((h, w), |(row, col)| {
        offsets.iter().any(|&(dr, dc)| {
            match (row.checked_add_signed(dr), col.checked_add_signed(dc)) {
                (Some(r), Some(c)) if r < h && c < w => mask[[r, c]],
                _ => false,
            }
        })
    })
}

/// A pixel stays foreground only if every pixel under the footprint is foreground.
///
/// Neighbours outside the frame count as foreground, so objects touching the
/// border are not eaten away from that side.
pub fn erode(mask: &ArrayView2<bool>, se: StructuringElement) -> Array2<bool> {
    let (h, w) = mask.dim();
    let offsets = se.offsets();
    Array2::from_shape_fn((h, w), |(row, col)| {
        offsets.iter().all(|&(dr, dc)| {
            match (row.checked_add_signed(dr), col.checked_add_signed(dc)) {
                (Some(r), Some(c)) if r < h && c < w => mask[[r, c]],
                _ => true,
            }
        })
    })
}

/// Turns background that cannot be reached from the frame border into foreground.
///
/// Background is flooded with 4-connectivity, so a diagonal gap in a ring does
/// not let the outside leak in.
pub fn fill_holes(mask: &ArrayView2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    if h == 0 || w == 0 {
        return mask.to_owned();
    }
    let mut outside = Array2::from_elem((h, w), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    let mut seed = |r: usize, c: usize, outside: &mut Array2<bool>| {
        if !mask[[r, c]] && !outside[[r, c]] {
            outside[[r, c]] = true;
            stack.push((r, c));
        }
    };
    for c in 0..w {
        seed(0, c, &mut outside);
        seed(h - 1, c, &mut outside);
    }
    for r in 0..h {
        seed(r, 0, &mut outside);
        seed(r, w - 1, &mut outside);
    }

    while let Some((r, c)) = stack.pop() {
        for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
            let (Some(nr), Some(nc)) = (r.checked_add_signed(dr), c.checked_add_signed(dc)) else {
                continue;
            };
            if nr < h && nc < w && !mask[[nr, nc]] && !outside[[nr, nc]] {
                outside[[nr, nc]] = true;
                stack.push((nr, nc));
            }
        }
    }

    outside.mapv(|o| !o)
}

/// Clears 2-D components with fewer than `min_size` pixels, in place.
pub fn remove_small_objects(
    mask: &mut Array2<bool>,
    min_size: usize,
    connectivity: Connectivity,
) -> usize {
    labeling::remove_small_objects(mask.view_mut().insert_axis(Axis(0)), min_size, connectivity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn count(mask: &Array2<bool>) -> usize {
        mask.iter().filter(|b| **b).count()
    }

    #[test]
    fn dilate_cross_grows_plus_shape() {
        let mut m = Array2::from_elem((5, 5), false);
        m[[2, 2]] = true;
        let d = dilate(&m.view(), StructuringElement::Cross);
        assert_eq!(count(&d), 5);
        assert!(d[[1, 2]] && d[[3, 2]] && d[[2, 1]] && d[[2, 3]]);
        assert!(!d[[1, 1]]);
        assert_eq!(count(&dilate(&m.view(), StructuringElement::Square)), 9);
    }

    #[test]
    fn erode_removes_isolated_pixel() {
        let mut m = Array2::from_elem((5, 5), false);
        m[[2, 2]] = true;
        assert_eq!(count(&erode(&m.view(), StructuringElement::Cross)), 0);
    }

    #[test]
    fn erode_keeps_full_frame() {
        let m = Array2::from_elem((4, 4), true);
        assert_eq!(erode(&m.view(), StructuringElement::Square), m);
    }

    #[test]
    fn opening_removes_noise_and_keeps_blocks() {
        let mut m = Array2::from_elem((9, 9), false);
        m[[0, 8]] = true;
        for r in 3..7 {
            for c in 3..7 {
                m[[r, c]] = true;
            }
        }
        let opened = MorphOp::Open.apply(&m.view(), StructuringElement::Square);
        assert!(!opened[[0, 8]]);
        assert_eq!(count(&opened), 16);
    }

    #[test]
    fn closing_bridges_single_pixel_gap() {
        let m = array![
            [false, false, false, false, false],
            [false, true, false, true, false],
            [false, false, false, false, false]
        ];
        let closed = MorphOp::Close.apply(&m.view(), StructuringElement::Square);
        assert!(closed[[1, 2]]);
        assert_eq!(closed.dim(), m.dim());
    }

    #[test]
    fn fill_holes_fills_enclosed_background() {
        let mut m = Array2::from_elem((5, 5), false);
        for r in 1..4 {
            for c in 1..4 {
                m[[r, c]] = true;
            }
        }
        m[[2, 2]] = false;
        let filled = fill_holes(&m.view());
        assert!(filled[[2, 2]]);
        assert!(!filled[[0, 0]]);
        assert_eq!(count(&filled), 9);
    }

    #[test]
    fn fill_holes_is_idempotent() {
        let mut m = Array2::from_elem((7, 7), false);
        for i in 1..6 {
            m[[1, i]] = true;
            m[[5, i]] = true;
            m[[i, 1]] = true;
            m[[i, 5]] = true;
        }
        m[[0, 3]] = true;
        let once = fill_holes(&m.view());
        let twice = fill_holes(&once.view());
        assert_eq!(once, twice);
        assert_eq!(count(&once), 26);
    }

    #[test]
    fn fill_holes_leaves_open_ring_alone() {
        let m = array![
            [false, true, true, true],
            [false, true, false, true],
            [false, true, false, true],
            [false, true, true, true]
        ];
        let open = {
            let mut o = m.clone();
            o[[3, 2]] = false;
            o
        };
        assert!(fill_holes(&m.view())[[1, 2]]);
        assert_eq!(fill_holes(&open.view()), open);
    }

    #[test]
    fn small_blob_below_cutoff_is_cleared() {
        let mut m = Array2::from_elem((6, 6), false);
        m[[2, 2]] = true;
        m[[2, 3]] = true;
        m[[3, 2]] = true;
        assert_eq!(remove_small_objects(&mut m, 10, Connectivity::Four), 1);
        assert_eq!(count(&m), 0);
    }
}
