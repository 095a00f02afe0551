//! Masked feature gather.

use ndarray::{Array2, Axis};

use crate::tensor::FeatureMap;

use super::PixelIndex;

/// Map a pixel position in `[0, len - 1]` linearly onto `[-1, 1]`.
///
/// A singleton axis has no extent; its only pixel sits at 0.
#[inline]
pub fn normalized_coord(pos: usize, len: usize) -> f32 {
    if len <= 1 {
        return 0.0;
    }
    2.0 * pos as f32 / (len - 1) as f32 - 1.0
}

/// Gather one row per pixel: the `C` feature values followed by the
/// normalized `x` (column) and `y` (row) position.
///
/// Returns an `(N, C + 2)` array whose rows follow the order of `pixels`.
pub fn gather_features(features: &FeatureMap, pixels: &[PixelIndex]) -> Array2<f32> {
    let channels = features.channels();
    let (height, width) = (features.height(), features.width());
    let mut rows = Array2::zeros((pixels.len(), channels + 2));

    for (mut row, p) in rows.axis_iter_mut(Axis(0)).zip(pixels) {
        for c in 0..channels {
            row[c] = features.value(p.batch, c, p.row, p.col);
        }
        row[channels] = normalized_coord(p.col, width);
        row[channels + 1] = normalized_coord(p.row, height);
    }

    rows
}
