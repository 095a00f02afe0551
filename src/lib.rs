//! # uvwarp
//!
//! Project image-space features into a canonical UV texture space using a
//! dense IUV correspondence map.
//!
//! An IUV map assigns every pixel a foreground confidence `I` and a pair of
//! normalized surface coordinates `(U, V)`. uvwarp sends each foreground
//! pixel's feature vector to the cell of an `R x R` UV grid its coordinates
//! round to, averages the vectors that collide in a cell and records which
//! cells were reached.
//!
//! ## Features
//!
//! - **Any feature width**: RGB images or learned `C`-channel feature maps
//! - **Collision averaging**: order-independent sum then mean per UV cell
//! - **Coverage mask**: a fused trailing channel marks the reached cells
//! - **Parallel**: batch elements and large pixel sets are reduced with rayon
//! - **Image I/O**: load RGB/IUV images, save warped textures and UV maps
//!
//! ## Quick Start
//!
//! ```
//! use ndarray::Array4;
//! use uvwarp::prelude::*;
//!
//! // One 4x4 image, every pixel foreground and mapped to uv = (1, 1).
//! let iuv = Array4::<f32>::ones((1, 3, 4, 4));
//! let correspondence = CorrespondenceMap::new(iuv).unwrap();
//! let features = FeatureMap::new(Array4::from_elem((1, 3, 4, 4), 0.25));
//!
//! let warped = warp_feature(&correspondence, &features, 8).unwrap();
//! assert_eq!(warped.as_array().dim(), (1, 6, 8, 8));
//!
//! // All 16 pixels collapse into the last cell and average to 0.25.
//! assert_eq!(warped.covered_cells(0), 1);
//! assert!((warped.features()[[0, 0, 7, 7]] - 0.25).abs() < 1e-6);
//! ```
//!
//! ## Options
//!
//! ```
//! use uvwarp::prelude::*;
//!
//! let options = WarpOptions::with_resolution(128)
//!     .with_threshold(0.7)
//!     .sequential();
//! assert_eq!(options.uv_resolution, 128);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod io;
pub mod progress;
pub mod tensor;
pub mod warp;

/// Prelude module for convenient imports.
///
/// ```
/// use uvwarp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Result, WarpError};
    pub use crate::progress::Progress;
    pub use crate::tensor::{CorrespondenceMap, FeatureMap, WarpedFeature};
    pub use crate::warp::{
        warp_feature, warp_feature_with_options, warp_feature_with_progress, PixelIndex, UvCell,
        WarpOptions,
    };
}

// Re-export the array crate used throughout the public API
pub use ndarray;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::Array4;

    #[test]
    fn test_rgb_round_trip_through_identity_uv() {
        // A 3x3 image whose UV equals its own normalized pixel position maps
        // one-to-one onto a 3x3 UV grid.
        let mut iuv = Array4::zeros((1, 3, 3, 3));
        let mut rgb = Array4::zeros((1, 3, 3, 3));
        for row in 0..3 {
            for col in 0..3 {
                iuv[[0, 0, row, col]] = 1.0;
                iuv[[0, 1, row, col]] = col as f32 / 2.0;
                iuv[[0, 2, row, col]] = row as f32 / 2.0;
                for c in 0..3 {
                    rgb[[0, c, row, col]] = (row * 3 + col + c) as f32 / 16.0;
                }
            }
        }

        let correspondence = CorrespondenceMap::new(iuv).unwrap();
        let features = FeatureMap::new(rgb.clone());
        let warped = warp_feature(&correspondence, &features, 3).unwrap();

        assert_eq!(warped.covered_cells(0), 9);
        for (got, want) in warped.features().iter().zip(rgb.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
