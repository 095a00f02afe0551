//! Foreground enumeration and UV grid indexing.

use nalgebra::Point2;
use rayon::prelude::*;

use crate::tensor::CorrespondenceMap;

/// A foreground pixel: batch element, row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelIndex {
    /// Batch element.
    pub batch: usize,
    /// Image row.
    pub row: usize,
    /// Image column.
    pub col: usize,
}

/// Integer cell of an `R x R` UV grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UvCell {
    /// Column in the UV grid.
    pub u: usize,
    /// Row in the UV grid.
    pub v: usize,
}

impl UvCell {
    /// Map normalized UV coordinates to a grid cell.
    ///
    /// Each coordinate is scaled by `R - 1`, rounded half-to-even and clamped
    /// into `[0, R - 1]`. Negative and NaN inputs land in cell 0.
    #[inline]
    pub fn from_normalized(uv: Point2<f32>, resolution: usize) -> Self {
        debug_assert!(resolution > 0);
        let max = resolution - 1;
        let scale = max as f32;
        Self {
            u: grid_coord(uv.x * scale, max),
            v: grid_coord(uv.y * scale, max),
        }
    }

    /// Row-major offset of this cell within one batch element (`u` fastest).
    #[inline]
    pub fn offset(&self, resolution: usize) -> usize {
        self.v * resolution + self.u
    }

    /// Flat accumulation slot `batch * R^2 + v * R + u`.
    #[inline]
    pub fn slot(&self, batch: usize, resolution: usize) -> usize {
        batch * resolution * resolution + self.offset(resolution)
    }
}

#[inline]
fn grid_coord(scaled: f32, max: usize) -> usize {
    let rounded = scaled.round_ties_even();
    // NaN and negatives saturate to 0 in the cast.
    (rounded as i64).clamp(0, max as i64) as usize
}

/// Enumerate foreground pixels in batch-major, then row, then column order.
///
/// A pixel is foreground iff its confidence is strictly greater than
/// `threshold`.
pub fn foreground_pixels(
    correspondence: &CorrespondenceMap,
    threshold: f32,
    parallel: bool,
) -> Vec<PixelIndex> {
    let batch_pixels = |batch: usize| {
        correspondence
            .confidence_plane(batch)
            .indexed_iter()
            .filter(|&(_, &conf)| conf > threshold)
            .map(|((row, col), _)| PixelIndex { batch, row, col })
            .collect::<Vec<_>>()
    };

    let batches = 0..correspondence.batch_size();
    if parallel {
        // collect() on an indexed parallel iterator keeps batch order.
        batches
            .into_par_iter()
            .map(batch_pixels)
            .collect::<Vec<_>>()
            .concat()
    } else {
        batches.flat_map(batch_pixels).collect()
    }
}

/// Flat accumulation slot of every pixel, in the order given.
pub fn flat_slots(
    correspondence: &CorrespondenceMap,
    pixels: &[PixelIndex],
    resolution: usize,
) -> Vec<usize> {
    pixels
        .iter()
        .map(|p| {
            UvCell::from_normalized(correspondence.uv(p.batch, p.row, p.col), resolution)
                .slot(p.batch, resolution)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_cell_rounding_and_clamping() {
        let r = 4;
        assert_eq!(UvCell::from_normalized(Point2::new(0.0, 0.0), r), UvCell { u: 0, v: 0 });
        assert_eq!(UvCell::from_normalized(Point2::new(1.0, 1.0), r), UvCell { u: 3, v: 3 });
        // 0.5 * 3 = 1.5 rounds to even 2; 0.16 * 3 = 0.48 rounds to 0.
        assert_eq!(UvCell::from_normalized(Point2::new(0.5, 0.16), r), UvCell { u: 2, v: 0 });
        assert_eq!(UvCell::from_normalized(Point2::new(1.4, -0.3), r), UvCell { u: 3, v: 0 });
        assert_eq!(UvCell::from_normalized(Point2::new(f32::NAN, 0.7), r), UvCell { u: 0, v: 2 });
    }

    #[test]
    fn test_resolution_one_has_single_cell() {
        for &uv in &[0.0, 0.49, 1.0] {
            assert_eq!(UvCell::from_normalized(Point2::new(uv, uv), 1), UvCell { u: 0, v: 0 });
        }
    }

    #[test]
    fn test_slot_is_v_major() {
        let cell = UvCell { u: 2, v: 1 };
        assert_eq!(cell.offset(5), 7);
        assert_eq!(cell.slot(3, 5), 3 * 25 + 7);
    }

    #[test]
    fn test_foreground_order() {
        let mut iuv = Array4::zeros((2, 3, 2, 3));
        iuv[[1, 0, 0, 2]] = 0.9;
        iuv[[0, 0, 1, 0]] = 0.9;
        iuv[[0, 0, 0, 2]] = 0.9;
        iuv[[1, 0, 1, 1]] = 0.51;
        iuv[[1, 0, 1, 2]] = 0.5;
        let map = CorrespondenceMap::new(iuv).unwrap();

        let expected = vec![
            PixelIndex { batch: 0, row: 0, col: 2 },
            PixelIndex { batch: 0, row: 1, col: 0 },
            PixelIndex { batch: 1, row: 0, col: 2 },
            PixelIndex { batch: 1, row: 1, col: 1 },
        ];
        assert_eq!(foreground_pixels(&map, 0.5, false), expected);
        assert_eq!(foreground_pixels(&map, 0.5, true), expected);
    }

    #[test]
    fn test_flat_slots_offset_by_batch() {
        let mut iuv = Array4::zeros((2, 3, 1, 1));
        iuv[[1, 1, 0, 0]] = 1.0; // u = 1
        iuv[[1, 2, 0, 0]] = 0.5; // v = 0.5
        let map = CorrespondenceMap::new(iuv).unwrap();
        let pixels = [
            PixelIndex { batch: 0, row: 0, col: 0 },
            PixelIndex { batch: 1, row: 0, col: 0 },
        ];

        // R = 3: batch 1 cell (u = 2, v = 1) -> 9 + 3 + 2.
        assert_eq!(flat_slots(&map, &pixels, 3), vec![0, 14]);
    }
}
