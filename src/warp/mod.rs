//! Image-space to UV-space feature warping.
//!
//! Given an IUV correspondence map and a feature map of the same spatial
//! size, every foreground pixel (confidence strictly above the threshold) is
//! sent to the UV cell its `(u, v)` coordinates round to. Pixels landing in
//! the same cell are averaged. The output carries the pooled features, the
//! pooled image-space `(x, y)` of the contributing pixels and a coverage
//! mask.
//!
//! # Pipeline
//!
//! 1. [`index`]: threshold and enumerate foreground pixels, compute the UV
//!    cell and the flat accumulation slot of each one
//! 2. [`gather`]: read the feature vector of each foreground pixel and append
//!    its normalized `(x, y)` position
//! 3. [`accumulate`]: scatter-add rows and counts into the UV grid
//! 4. [`accumulate::normalize`]: divide by count, append the mask, reshape
//!    to channel-first
//!
//! # Example
//!
//! ```
//! use ndarray::Array4;
//! use uvwarp::prelude::*;
//!
//! let mut iuv = Array4::<f32>::zeros((1, 3, 2, 2));
//! iuv[[0, 0, 0, 0]] = 1.0; // one foreground pixel at uv = (0, 0)
//! let correspondence = CorrespondenceMap::new(iuv).unwrap();
//! let features = FeatureMap::new(Array4::from_elem((1, 3, 2, 2), 0.5));
//!
//! let warped = warp_feature(&correspondence, &features, 4).unwrap();
//! assert_eq!(warped.as_array().dim(), (1, 6, 4, 4));
//! assert_eq!(warped.covered_cells(0), 1);
//! ```

pub mod accumulate;
pub mod gather;
pub mod index;

pub use index::{PixelIndex, UvCell};

use crate::error::{Result, WarpError};
use crate::progress::Progress;
use crate::tensor::{CorrespondenceMap, FeatureMap, WarpedFeature};

/// Confidence above which a pixel counts as foreground.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Added to the per-cell count before dividing.
pub const DEFAULT_EPSILON: f32 = 1e-8;

/// Options for [`warp_feature_with_options`].
#[derive(Debug, Clone)]
pub struct WarpOptions {
    /// Side length `R` of the square UV grid.
    pub uv_resolution: usize,

    /// Foreground threshold; a pixel is foreground iff confidence > threshold.
    pub threshold: f32,

    /// Guard added to the count when normalizing.
    pub epsilon: f32,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for WarpOptions {
    fn default() -> Self {
        Self {
            uv_resolution: 256,
            threshold: DEFAULT_THRESHOLD,
            epsilon: DEFAULT_EPSILON,
            parallel: true,
        }
    }
}

impl WarpOptions {
    /// Create options for the given UV resolution.
    pub fn with_resolution(uv_resolution: usize) -> Self {
        Self {
            uv_resolution,
            ..Self::default()
        }
    }

    /// Set the foreground threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the normalization epsilon.
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.uv_resolution == 0 {
            return Err(WarpError::InvalidResolution {
                resolution: self.uv_resolution,
            });
        }
        if !self.threshold.is_finite() {
            return Err(WarpError::invalid_param(
                "threshold",
                self.threshold,
                "must be finite",
            ));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(WarpError::invalid_param(
                "epsilon",
                self.epsilon,
                "must be positive and finite",
            ));
        }
        Ok(())
    }
}

/// Warp a feature map into UV space with default options.
///
/// # Errors
///
/// Fails before any allocation if the batch or spatial sizes of the two maps
/// differ or `uv_resolution` is zero (see [`WarpError::is_shape_mismatch`]).
pub fn warp_feature(
    correspondence: &CorrespondenceMap,
    features: &FeatureMap,
    uv_resolution: usize,
) -> Result<WarpedFeature> {
    warp_feature_with_options(
        correspondence,
        features,
        &WarpOptions::with_resolution(uv_resolution),
    )
}

/// Warp a feature map into UV space.
pub fn warp_feature_with_options(
    correspondence: &CorrespondenceMap,
    features: &FeatureMap,
    options: &WarpOptions,
) -> Result<WarpedFeature> {
    warp_feature_with_progress(correspondence, features, options, &Progress::none())
}

/// Warp a feature map into UV space, reporting each pipeline stage.
pub fn warp_feature_with_progress(
    correspondence: &CorrespondenceMap,
    features: &FeatureMap,
    options: &WarpOptions,
    progress: &Progress,
) -> Result<WarpedFeature> {
    check_shapes(correspondence, features)?;
    options.validate()?;

    const STAGES: usize = 4;
    let resolution = options.uv_resolution;
    let batch_size = features.batch_size();

    progress.report(0, STAGES, "Indexing foreground pixels");
    let pixels = index::foreground_pixels(correspondence, options.threshold, options.parallel);
    let slots = index::flat_slots(correspondence, &pixels, resolution);
    log::trace!("indexed {} foreground pixels", pixels.len());

    progress.report(1, STAGES, "Gathering features");
    let rows = gather::gather_features(features, &pixels);

    progress.report(2, STAGES, "Accumulating into UV grid");
    let grid = accumulate::scatter_accumulate(
        &rows,
        &slots,
        batch_size,
        resolution,
        options.parallel,
    );

    progress.report(3, STAGES, "Normalizing");
    let warped = accumulate::normalize(grid, options.epsilon);
    let output = WarpedFeature::from_parts(
        accumulate::to_channels_first(warped, batch_size, resolution),
        features.channels(),
    );
    progress.report(STAGES, STAGES, "Done");

    log::debug!(
        "warped {} foreground pixels of {}x{}x{} into {} UV cells at resolution {}",
        pixels.len(),
        batch_size,
        features.height(),
        features.width(),
        (0..batch_size).map(|b| output.covered_cells(b)).sum::<usize>(),
        resolution
    );

    Ok(output)
}

fn check_shapes(correspondence: &CorrespondenceMap, features: &FeatureMap) -> Result<()> {
    if correspondence.batch_size() != features.batch_size() {
        return Err(WarpError::BatchMismatch {
            correspondence: correspondence.batch_size(),
            features: features.batch_size(),
        });
    }
    let iuv_size = (correspondence.height(), correspondence.width());
    let feature_size = (features.height(), features.width());
    if iuv_size != feature_size {
        return Err(WarpError::SpatialMismatch {
            correspondence: iuv_size,
            features: feature_size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, Axis};

    fn correspondence(data: Array4<f32>) -> CorrespondenceMap {
        CorrespondenceMap::new(data).unwrap()
    }

    /// The 2x2 scenario: two pixels collide in cell (0, 0), two share (1, 1).
    fn collision_scene() -> (CorrespondenceMap, FeatureMap) {
        let mut iuv = Array4::zeros((1, 3, 2, 2));
        iuv.index_axis_mut(Axis(1), 0).fill(1.0);
        // row 1 maps to u = v = 1
        for col in 0..2 {
            iuv[[0, 1, 1, col]] = 1.0;
            iuv[[0, 2, 1, col]] = 1.0;
        }
        (correspondence(iuv), FeatureMap::new(Array4::ones((1, 1, 2, 2))))
    }

    #[test]
    fn test_collision_scene() {
        let (iuv, features) = collision_scene();
        let warped = warp_feature(&iuv, &features, 2).unwrap();
        let out = warped.as_array();

        assert_eq!(out.dim(), (1, 4, 2, 2));
        assert!((out[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(out[[0, 3, 0, 0]], 1.0);
        assert!((out[[0, 0, 1, 1]] - 1.0).abs() < 1e-6);
        assert_eq!(out[[0, 3, 1, 1]], 1.0);

        for &(v, u) in &[(0, 1), (1, 0)] {
            for c in 0..4 {
                assert_eq!(out[[0, c, v, u]], 0.0);
            }
        }
    }

    #[test]
    fn test_collision_scene_coordinates() {
        let (iuv, features) = collision_scene();
        let warped = warp_feature(&iuv, &features, 2).unwrap();
        let coords = warped.coords();

        // Cell (0, 0) averages pixels (0, 0) and (0, 1): x = (-1 + 1) / 2, y = -1.
        assert!(coords[[0, 0, 0, 0]].abs() < 1e-6);
        assert!((coords[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
        // Cell (1, 1) averages pixels (1, 0) and (1, 1): x = 0, y = 1.
        assert!(coords[[0, 0, 1, 1]].abs() < 1e-6);
        assert!((coords[[0, 1, 1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_foreground_is_all_zero() {
        let mut iuv = Array4::from_elem((2, 3, 3, 3), 0.7);
        iuv.index_axis_mut(Axis(1), 0).fill(0.2);
        let features = FeatureMap::new(Array4::from_elem((2, 4, 3, 3), 3.0));

        let warped = warp_feature(&correspondence(iuv), &features, 5).unwrap();
        assert_eq!(warped.as_array().dim(), (2, 7, 5, 5));
        assert!(warped.as_array().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut iuv = Array4::zeros((1, 3, 1, 2));
        iuv[[0, 0, 0, 0]] = 0.5;
        iuv[[0, 0, 0, 1]] = 0.5 + 1e-6;
        iuv[[0, 1, 0, 1]] = 1.0;
        let features = FeatureMap::new(Array4::from_elem((1, 1, 1, 2), 2.0));

        let warped = warp_feature(&correspondence(iuv), &features, 2).unwrap();
        let mask = warped.mask();

        // Pixel 0 (uv = 0, 0) is background; pixel 1 (u = 1, v = 0) is foreground.
        assert_eq!(mask[[0, 0, 0]], 0.0);
        assert_eq!(mask[[0, 0, 1]], 1.0);
        assert_eq!(warped.covered_cells(0), 1);
    }

    #[test]
    fn test_shape_errors() {
        let iuv = correspondence(Array4::zeros((2, 3, 4, 4)));

        let err = warp_feature(&iuv, &FeatureMap::new(Array4::zeros((1, 3, 4, 4))), 8).unwrap_err();
        assert!(matches!(err, WarpError::BatchMismatch { correspondence: 2, features: 1 }));

        let err = warp_feature(&iuv, &FeatureMap::new(Array4::zeros((2, 3, 4, 5))), 8).unwrap_err();
        assert!(matches!(err, WarpError::SpatialMismatch { .. }));
        assert!(err.is_shape_mismatch());

        let err = warp_feature(&iuv, &FeatureMap::new(Array4::zeros((2, 3, 4, 4))), 0).unwrap_err();
        assert!(matches!(err, WarpError::InvalidResolution { resolution: 0 }));
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_invalid_options() {
        let iuv = correspondence(Array4::zeros((1, 3, 2, 2)));
        let features = FeatureMap::new(Array4::zeros((1, 1, 2, 2)));

        let options = WarpOptions::with_resolution(4).with_threshold(f32::NAN);
        let err = warp_feature_with_options(&iuv, &features, &options).unwrap_err();
        assert!(matches!(err, WarpError::InvalidParameter { name: "threshold", .. }));

        let options = WarpOptions::with_resolution(4).with_epsilon(0.0);
        let err = warp_feature_with_options(&iuv, &features, &options).unwrap_err();
        assert!(matches!(err, WarpError::InvalidParameter { name: "epsilon", .. }));
    }

    #[test]
    fn test_progress_reports_every_stage() {
        use std::sync::{Arc, Mutex};

        let (iuv, features) = collision_scene();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let progress = Progress::new(move |current, total, _| {
            sink.lock().unwrap().push((current, total));
        });

        warp_feature_with_progress(&iuv, &features, &WarpOptions::with_resolution(2), &progress)
            .unwrap();
        assert_eq!(
            *stages.lock().unwrap(),
            vec![(0, 4), (1, 4), (2, 4), (3, 4), (4, 4)]
        );
    }

    #[test]
    fn test_nan_confidence_is_background() {
        let mut iuv = Array4::zeros((1, 3, 1, 1));
        iuv[[0, 0, 0, 0]] = f32::NAN;
        let features = FeatureMap::new(Array4::ones((1, 1, 1, 1)));

        let warped = warp_feature(&correspondence(iuv), &features, 3).unwrap();
        assert_eq!(warped.covered_cells(0), 0);
    }
}
