//! Connected component labeling of binary masks and volumes.
//!
//! Labels are assigned in raster order (depth, then row, then column) of the
//! first voxel of each component, so the output order is stable between runs.
//! The in-plane connectivities (`Four`, `Eight`) never join voxels of different
//! slices, which is how a volume is labeled slice by slice.

use ndarray::{Array3, ArrayView3, ArrayViewMut3, Axis};
use serde::{Deserialize, Serialize};

use crate::common::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours within a slice.
    Four,
    /// Edge and corner neighbours within a slice.
    Eight,
    /// Face neighbours in 3-D.
    Six,
    /// Face and edge neighbours in 3-D.
    Eighteen,
    /// Every voxel touching the centre in 3-D.
    TwentySix,
}

impl Connectivity {
    /// Neighbour offsets as `[dz, dy, dx]`.
    pub fn offsets(&self) -> Vec<[isize; 3]> {
        let mut offsets = Vec::with_capacity(26);
        for dz in -1..=1isize {
            for dy in -1..=1isize {
                for dx in -1..=1isize {
                    let moved = [dz, dy, dx].iter().filter(|d| **d != 0).count();
                    let keep = match self {
                        Connectivity::Four => dz == 0 && moved == 1,
                        Connectivity::Eight => dz == 0 && moved >= 1,
                        Connectivity::Six => moved == 1,
                        Connectivity::Eighteen => moved == 1 || moved == 2,
                        Connectivity::TwentySix => moved >= 1,
                    };
                    if keep {
                        offsets.push([dz, dy, dx]);
                    }
                }
            }
        }
        offsets
    }

    pub fn is_planar(&self) -> bool {
        matches!(self, Connectivity::Four | Connectivity::Eight)
    }
}

/// Result of labeling a volume.
#[derive(Debug)]
pub struct Labels {
    /// 0 is background, components are numbered from 1.
    pub map: Array3<u32>,
    /// `sizes[i]` is the voxel count of label `i + 1`.
    pub sizes: Vec<usize>,
    /// `boxes[i]` is the bounding box of label `i + 1`.
    pub boxes: Vec<BoundingBox>,
}

impl Labels {
    pub fn num_labels(&self) -> usize {
        self.sizes.len()
    }
}

#[inline]
fn neighbour(p: [usize; 3], d: [isize; 3], dim: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let v = p[axis].checked_add_signed(d[axis])?;
        if v >= dim[axis] {
            return None;
        }
        out[axis] = v;
    }
    Some(out)
}

/// Labels the connected foreground components of `mask`.
pub fn label(mask: &ArrayView3<bool>, connectivity: Connectivity) -> Labels {
    let (depth, rows, cols) = mask.dim();
    let dim = [depth, rows, cols];
    let offsets = connectivity.offsets();
    let mut map = Array3::<u32>::zeros((depth, rows, cols));
    let mut sizes = Vec::new();
    let mut boxes = Vec::new();
    let mut stack: Vec<[usize; 3]> = Vec::new();

    for ((z, y, x), &fg) in mask.indexed_iter() {
        if !fg || map[[z, y, x]] != 0 {
            continue;
        }
        let id = sizes.len() as u32 + 1;
        let mut size = 0usize;
        let mut bbox = BoundingBox::at(z, y, x);
        map[[z, y, x]] = id;
        stack.push([z, y, x]);

        while let Some(p) = stack.pop() {
            size += 1;
            bbox.include(p[0], p[1], p[2]);
            for d in &offsets {
                if let Some(n) = neighbour(p, *d, dim) {
                    if mask[n] && map[n] == 0 {
                        map[n] = id;
                        stack.push(n);
                    }
                }
            }
        }
        sizes.push(size);
        boxes.push(bbox);
    }

    Labels { map, sizes, boxes }
}

/// Bounding boxes of every component of `volume`, ordered by label.
pub fn bounding_boxes(volume: &ArrayView3<bool>, connectivity: Connectivity) -> Vec<BoundingBox> {
    label(volume, connectivity).boxes
}

/// Labels each slice on its own and returns `(depth index, box)` pairs.
///
/// The boxes span a single slice, so `z_min == z_max == depth index`.
pub fn slice_bounding_boxes(
    volume: &ArrayView3<bool>,
    connectivity: Connectivity,
) -> Vec<(usize, BoundingBox)> {
    let planar = match connectivity {
        Connectivity::Four | Connectivity::Six => Connectivity::Four,
        _ => Connectivity::Eight,
    };
    let mut out = Vec::new();
    for (z, slice) in volume.axis_iter(Axis(0)).enumerate() {
        for b in label(&slice.insert_axis(Axis(0)), planar).boxes {
            out.push((z, BoundingBox::new(z, b.y_min, b.x_min, z, b.y_max, b.x_max)));
        }
    }
    out
}

/// Clears every component with fewer than `min_size` voxels.
///
/// Returns the number of components that were removed.
pub fn remove_small_objects(
    mut mask: ArrayViewMut3<bool>,
    min_size: usize,
    connectivity: Connectivity,
) -> usize {
    if min_size <= 1 {
        return 0;
    }
    let labels = label(&mask.view(), connectivity);
    if labels.num_labels() == 0 {
        return 0;
    }
    let small: Vec<bool> = labels.sizes.iter().map(|&s| s < min_size).collect();
    if !small.contains(&true) {
        return 0;
    }
    ndarray::Zip::from(&mut mask)
        .and(&labels.map)
        .for_each(|m, &id| {
            if id != 0 && small[id as usize - 1] {
                *m = false;
            }
        });
    small.iter().filter(|s| **s).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume_with(points: &[(usize, usize, usize)], dim: (usize, usize, usize)) -> Array3<bool> {
        let mut v = Array3::from_elem(dim, false);
        for &(z, y, x) in points {
            v[[z, y, x]] = true;
        }
        v
    }

    #[test]
    fn offset_counts() {
        assert_eq!(Connectivity::Four.offsets().len(), 4);
        assert_eq!(Connectivity::Eight.offsets().len(), 8);
        assert_eq!(Connectivity::Six.offsets().len(), 6);
        assert_eq!(Connectivity::Eighteen.offsets().len(), 18);
        assert_eq!(Connectivity::TwentySix.offsets().len(), 26);
    }

    #[test]
    fn empty_volume_has_no_boxes() {
        let v = Array3::from_elem((4, 6, 6), false);
        assert!(bounding_boxes(&v.view(), Connectivity::TwentySix).is_empty());
        assert!(slice_bounding_boxes(&v.view(), Connectivity::Eight).is_empty());
    }

    #[test]
    fn single_voxel_box_is_degenerate() {
        let v = volume_with(&[(2, 3, 4)], (5, 6, 7));
        let boxes = bounding_boxes(&v.view(), Connectivity::TwentySix);
        assert_eq!(boxes, vec![BoundingBox::at(2, 3, 4)]);
    }

    #[test]
    fn diagonal_voxels_depend_on_connectivity() {
        let v = volume_with(&[(0, 0, 0), (1, 1, 1)], (2, 2, 2));
        assert_eq!(label(&v.view(), Connectivity::Six).num_labels(), 2);
        assert_eq!(label(&v.view(), Connectivity::Eighteen).num_labels(), 2);
        assert_eq!(label(&v.view(), Connectivity::TwentySix).num_labels(), 1);
    }

    #[test]
    fn planar_connectivity_never_joins_slices() {
        let v = volume_with(&[(0, 1, 1), (1, 1, 1)], (2, 3, 3));
        assert_eq!(label(&v.view(), Connectivity::Eight).num_labels(), 2);
        assert_eq!(label(&v.view(), Connectivity::Six).num_labels(), 1);
    }

    #[test]
    fn labels_follow_raster_order() {
        let v = volume_with(&[(1, 0, 0), (0, 2, 2), (0, 0, 3)], (2, 3, 4));
        let boxes = bounding_boxes(&v.view(), Connectivity::Six);
        assert_eq!(
            boxes,
            vec![
                BoundingBox::at(0, 0, 3),
                BoundingBox::at(0, 2, 2),
                BoundingBox::at(1, 0, 0)
            ]
        );
    }

    #[test]
    fn box_spans_whole_component() {
        let v = volume_with(&[(1, 2, 2), (1, 2, 3), (2, 2, 3), (2, 3, 3)], (4, 6, 6));
        let labels = label(&v.view(), Connectivity::Six);
        assert_eq!(labels.sizes, vec![4]);
        assert_eq!(labels.boxes[0], BoundingBox::new(1, 2, 2, 2, 3, 3));
    }

    #[test]
    fn slice_boxes_split_by_depth() {
        let v = volume_with(&[(1, 2, 2), (2, 2, 2), (2, 4, 4)], (3, 6, 6));
        let boxes = slice_bounding_boxes(&v.view(), Connectivity::Eight);
        assert_eq!(
            boxes,
            vec![
                (1, BoundingBox::at(1, 2, 2)),
                (2, BoundingBox::at(2, 2, 2)),
                (2, BoundingBox::at(2, 4, 4)),
            ]
        );
    }

    #[test]
    fn removes_only_components_below_cutoff() {
        let mut v = volume_with(
            &[(0, 0, 0), (0, 0, 1), (0, 0, 2), (1, 3, 3), (1, 3, 4), (1, 4, 3), (1, 4, 4)],
            (2, 5, 5),
        );
        let removed = remove_small_objects(v.view_mut(), 4, Connectivity::Six);
        assert_eq!(removed, 1);
        assert!(!v[[0, 0, 1]]);
        assert!(v[[1, 4, 4]]);
        assert_eq!(v.iter().filter(|b| **b).count(), 4);
    }

    #[test]
    fn cutoff_of_one_keeps_everything() {
        let mut v = volume_with(&[(0, 0, 0)], (1, 2, 2));
        assert_eq!(remove_small_objects(v.view_mut(), 1, Connectivity::Six), 0);
        assert!(v[[0, 0, 0]]);
    }
}
