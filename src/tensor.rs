//! Dense batch arrays consumed and produced by the warper.
//!
//! All arrays are channel-first `(batch, channel, row, col)` [`Array4<f32>`]
//! buffers. The wrappers only add shape validation and named accessors; the
//! underlying array is always reachable through `as_array` / `into_array`.

use nalgebra::Point2;
use ndarray::{s, Array4, ArrayView2, ArrayView3, ArrayView4, Axis};

use crate::error::{Result, WarpError};

/// Per-pixel IUV correspondence map of shape `(B, 3, H, W)`.
///
/// Channel 0 is the foreground confidence in `[0, 1]`, channels 1 and 2 are
/// the normalized `u` and `v` surface coordinates in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceMap {
    data: Array4<f32>,
}

impl CorrespondenceMap {
    /// Number of channels in an IUV map.
    pub const CHANNELS: usize = 3;

    /// Wrap an IUV array, checking that it has exactly three channels.
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let channels = data.dim().1;
        if channels != Self::CHANNELS {
            return Err(WarpError::ChannelMismatch {
                expected: Self::CHANNELS,
                actual: channels,
            });
        }
        Ok(Self { data })
    }

    /// Batch size `B`.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.data.dim().0
    }

    /// Image height `H`.
    #[inline]
    pub fn height(&self) -> usize {
        self.data.dim().2
    }

    /// Image width `W`.
    #[inline]
    pub fn width(&self) -> usize {
        self.data.dim().3
    }

    /// Foreground confidence at a pixel.
    #[inline]
    pub fn confidence(&self, batch: usize, row: usize, col: usize) -> f32 {
        self.data[[batch, 0, row, col]]
    }

    /// Normalized UV coordinates at a pixel (`x` = u, `y` = v).
    #[inline]
    pub fn uv(&self, batch: usize, row: usize, col: usize) -> Point2<f32> {
        Point2::new(self.data[[batch, 1, row, col]], self.data[[batch, 2, row, col]])
    }

    /// The confidence plane of one batch element, shape `(H, W)`.
    pub fn confidence_plane(&self, batch: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![batch, 0, .., ..])
    }

    /// Borrow the underlying array.
    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Take the underlying array.
    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Per-pixel feature map of shape `(B, C, H, W)` with any channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
    data: Array4<f32>,
}

impl FeatureMap {
    /// Wrap a feature array.
    pub fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// Batch size `B`.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.data.dim().0
    }

    /// Channel count `C`.
    #[inline]
    pub fn channels(&self) -> usize {
        self.data.dim().1
    }

    /// Image height `H`.
    #[inline]
    pub fn height(&self) -> usize {
        self.data.dim().2
    }

    /// Image width `W`.
    #[inline]
    pub fn width(&self) -> usize {
        self.data.dim().3
    }

    /// Feature value of one channel at a pixel.
    #[inline]
    pub fn value(&self, batch: usize, channel: usize, row: usize, col: usize) -> f32 {
        self.data[[batch, channel, row, col]]
    }

    /// Borrow the underlying array.
    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Take the underlying array.
    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

impl From<Array4<f32>> for FeatureMap {
    fn from(data: Array4<f32>) -> Self {
        Self::new(data)
    }
}

/// Features pooled into UV space, shape `(B, C + 3, R, R)`.
///
/// Channel layout: `0..C` pooled features, `C` pooled image x, `C + 1`
/// pooled image y (both in `[-1, 1]`), `C + 2` coverage mask. Row index is
/// `v`, column index is `u`.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpedFeature {
    data: Array4<f32>,
    feature_channels: usize,
}

impl WarpedFeature {
    /// Number of channels appended after the features (x, y, mask).
    pub const EXTRA_CHANNELS: usize = 3;

    pub(crate) fn from_parts(data: Array4<f32>, feature_channels: usize) -> Self {
        debug_assert_eq!(data.dim().1, feature_channels + Self::EXTRA_CHANNELS);
        Self {
            data,
            feature_channels,
        }
    }

    /// Batch size `B`.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.data.dim().0
    }

    /// UV resolution `R`.
    #[inline]
    pub fn resolution(&self) -> usize {
        self.data.dim().2
    }

    /// Number of pooled input feature channels `C`.
    #[inline]
    pub fn feature_channels(&self) -> usize {
        self.feature_channels
    }

    /// Pooled input features, shape `(B, C, R, R)`.
    pub fn features(&self) -> ArrayView4<'_, f32> {
        self.data.slice(s![.., ..self.feature_channels, .., ..])
    }

    /// Pooled image-space coordinates `(x, y)`, shape `(B, 2, R, R)`.
    pub fn coords(&self) -> ArrayView4<'_, f32> {
        let c = self.feature_channels;
        self.data.slice(s![.., c..c + 2, .., ..])
    }

    /// Coverage mask, shape `(B, R, R)`, 1.0 where any pixel landed.
    pub fn mask(&self) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(1), self.feature_channels + 2)
    }

    /// The trailing `(x, y, mask)` channels, shape `(B, 3, R, R)`.
    pub fn uv_channels(&self) -> ArrayView4<'_, f32> {
        self.data.slice(s![.., self.feature_channels.., .., ..])
    }

    /// Number of covered cells in one batch element.
    pub fn covered_cells(&self, batch: usize) -> usize {
        self.mask()
            .index_axis(Axis(0), batch)
            .iter()
            .filter(|&&m| m > 0.0)
            .count()
    }

    /// Borrow the fused output array.
    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Take the fused output array.
    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}
