//! Error types for uvwarp.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`WarpError`].
pub type Result<T> = std::result::Result<T, WarpError>;

/// Errors that can occur while warping features or handling their images.
#[derive(Error, Debug)]
pub enum WarpError {
    /// The correspondence map and the feature map disagree on batch size.
    #[error("batch size mismatch: correspondence map has {correspondence}, feature map has {features}")]
    BatchMismatch {
        /// Batch size of the correspondence map.
        correspondence: usize,
        /// Batch size of the feature map.
        features: usize,
    },

    /// The correspondence map and the feature map disagree on spatial size.
    #[error(
        "spatial size mismatch: correspondence map is {}x{}, feature map is {}x{}",
        .correspondence.0, .correspondence.1, .features.0, .features.1
    )]
    SpatialMismatch {
        /// (height, width) of the correspondence map.
        correspondence: (usize, usize),
        /// (height, width) of the feature map.
        features: (usize, usize),
    },

    /// An array has the wrong number of channels.
    #[error("expected {expected} channels, got {actual}")]
    ChannelMismatch {
        /// Required channel count.
        expected: usize,
        /// Channel count found.
        actual: usize,
    },

    /// The target UV resolution is not a positive integer.
    #[error("UV resolution must be positive, got {resolution}")]
    InvalidResolution {
        /// The rejected resolution.
        resolution: usize,
    },

    /// A batch was requested from zero samples.
    #[error("cannot build a batch from zero samples")]
    EmptyBatch,

    /// The number of output names differs from the batch size.
    #[error("got {identifiers} output identifiers for a batch of {batch}")]
    IdentifierMismatch {
        /// Identifiers supplied.
        identifiers: usize,
        /// Batch size of the array being saved.
        batch: usize,
    },

    /// A warped map does not carry enough feature channels for the request.
    #[error("operation needs {required} feature channels, warped map has {actual}")]
    NotEnoughChannels {
        /// Channels needed.
        required: usize,
        /// Feature channels available.
        actual: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Unsupported image file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },
}

impl WarpError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        WarpError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Whether this error belongs to the shape-mismatch family.
    ///
    /// These are the precondition failures raised before any computation:
    /// batch, spatial or channel disagreement and a non-positive resolution.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            WarpError::BatchMismatch { .. }
                | WarpError::SpatialMismatch { .. }
                | WarpError::ChannelMismatch { .. }
                | WarpError::InvalidResolution { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_family() {
        assert!(WarpError::BatchMismatch { correspondence: 1, features: 2 }.is_shape_mismatch());
        assert!(WarpError::InvalidResolution { resolution: 0 }.is_shape_mismatch());
        assert!(!WarpError::EmptyBatch.is_shape_mismatch());
        assert!(!WarpError::invalid_param("threshold", f32::NAN, "must be finite").is_shape_mismatch());
    }

    #[test]
    fn test_spatial_message() {
        let err = WarpError::SpatialMismatch {
            correspondence: (4, 5),
            features: (4, 6),
        };
        assert_eq!(
            err.to_string(),
            "spatial size mismatch: correspondence map is 4x5, feature map is 4x6"
        );
    }
}
