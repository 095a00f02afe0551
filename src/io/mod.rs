//! Image file I/O.
//!
//! Loading turns image files into channel-first float arrays the warper
//! consumes; saving writes warped UV maps back out as 8-bit images.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save |
//! |--------|-----------|------|------|
//! | PNG | `.png` | ✓ | ✓ |
//! | JPEG | `.jpg`, `.jpeg` | ✓ | ✓ |
//! | BMP | `.bmp` | ✓ | ✓ |
//!
//! IUV images should be stored losslessly (PNG or BMP); JPEG artifacts shift
//! both the part index and the UV bytes.
//!
//! # Usage
//!
//! ```no_run
//! use uvwarp::io;
//! use uvwarp::prelude::*;
//!
//! let image = io::load_rgb("person.png").unwrap();
//! let iuv = io::load_iuv("person_iuv.png").unwrap();
//!
//! let features = FeatureMap::new(io::stack_batch(&[image]).unwrap());
//! let correspondence = io::prepare_correspondence(io::stack_batch(&[iuv]).unwrap()).unwrap();
//!
//! let warped = warp_feature(&correspondence, &features, 128).unwrap();
//! io::save_texture(&["person.png"], "out/texture", &warped).unwrap();
//! io::save_uv_map(&["person.png"], "out/uv", &warped).unwrap();
//! ```

mod convert;

pub use convert::{array_to_rgb_image, rgb_image_to_array};

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{s, Array3, Array4, Axis};

use crate::error::{Result, WarpError};
use crate::tensor::{CorrespondenceMap, WarpedFeature};

/// Supported image file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Portable Network Graphics.
    Png,
    /// JPEG.
    Jpeg,
    /// Windows bitmap.
    Bmp,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Format::Png),
            "jpg" | "jpeg" => Some(Format::Jpeg),
            "bmp" => Some(Format::Bmp),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }

    fn image_format(self) -> image::ImageFormat {
        match self {
            Format::Png => image::ImageFormat::Png,
            Format::Jpeg => image::ImageFormat::Jpeg,
            Format::Bmp => image::ImageFormat::Bmp,
        }
    }
}

fn require_format(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| WarpError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load an RGB image as a `(3, H, W)` array scaled to `[0, 1]`.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
    let mut array = load_bytes(path.as_ref())?;
    array.mapv_inplace(|x| x / 255.0);
    Ok(array)
}

/// Load a raw IUV image as a `(3, H, W)` array of byte values.
///
/// Channel 0 is the part index `I`, channels 1 and 2 are `U` and `V` in
/// `0..=255`. Use [`prepare_correspondence`] to turn a batch of these into
/// a [`CorrespondenceMap`].
pub fn load_iuv<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
    load_bytes(path.as_ref())
}

fn load_bytes(path: &Path) -> Result<Array3<f32>> {
    let format = require_format(path)?;
    let image = image::open(path)?;
    log::debug!(
        "loaded {} ({:?}, {}x{})",
        path.display(),
        format,
        image.width(),
        image.height()
    );
    Ok(rgb_image_to_array(&image.to_rgb8()))
}

/// Stack `(C, H, W)` samples into a `(B, C, H, W)` batch.
///
/// # Errors
///
/// [`WarpError::EmptyBatch`] for no samples, [`WarpError::ChannelMismatch`] or
/// [`WarpError::SpatialMismatch`] when a sample differs from the first one.
pub fn stack_batch(samples: &[Array3<f32>]) -> Result<Array4<f32>> {
    let first = samples.first().ok_or(WarpError::EmptyBatch)?;
    let (channels, height, width) = first.dim();

    for sample in &samples[1..] {
        let (c, h, w) = sample.dim();
        if c != channels {
            return Err(WarpError::ChannelMismatch {
                expected: channels,
                actual: c,
            });
        }
        if (h, w) != (height, width) {
            return Err(WarpError::SpatialMismatch {
                correspondence: (height, width),
                features: (h, w),
            });
        }
    }

    Ok(Array4::from_shape_fn(
        (samples.len(), channels, height, width),
        |(b, c, y, x)| samples[b][[c, y, x]],
    ))
}

/// Turn a batch of raw IUV byte arrays into a [`CorrespondenceMap`].
///
/// Any non-zero part index becomes confidence 1, everything else 0; the UV
/// bytes are divided by 255.
pub fn prepare_correspondence(mut raw_iuv: Array4<f32>) -> Result<CorrespondenceMap> {
    let channels = raw_iuv.dim().1;
    if channels != CorrespondenceMap::CHANNELS {
        return Err(WarpError::ChannelMismatch {
            expected: CorrespondenceMap::CHANNELS,
            actual: channels,
        });
    }

    for (c, mut plane) in raw_iuv.axis_iter_mut(Axis(1)).enumerate() {
        if c == 0 {
            plane.mapv_inplace(|i| if i > 0.0 { 1.0 } else { 0.0 });
        } else {
            plane.mapv_inplace(|x| x / 255.0);
        }
    }

    CorrespondenceMap::new(raw_iuv)
}

/// Output file name for a sample identifier: its last path component.
pub fn output_name(identifier: &str) -> &str {
    identifier.rsplit(['/', '\\']).next().unwrap_or(identifier)
}

/// Save the first three feature channels of every batch element as an RGB
/// image in `dir`, named after the matching identifier.
///
/// Values are scaled by 255 and saturated to bytes.
pub fn save_texture<S, P>(identifiers: &[S], dir: P, warped: &WarpedFeature) -> Result<Vec<PathBuf>>
where
    S: AsRef<str>,
    P: AsRef<Path>,
{
    if warped.feature_channels() < 3 {
        return Err(WarpError::NotEnoughChannels {
            required: 3,
            actual: warped.feature_channels(),
        });
    }
    let features = warped.features();
    save_batch(identifiers, dir.as_ref(), warped.batch_size(), |b| {
        array_to_rgb_image(features.index_axis(Axis(0), b).slice_move(s![..3, .., ..]))
    })
}

/// Save the trailing `(x, y, mask)` channels of every batch element as an
/// image in `dir`, named after the matching identifier.
///
/// The channels are written in reverse order, so the file's red channel is
/// the coverage mask, green is `y` and blue is `x`. Negative coordinates
/// saturate to 0.
pub fn save_uv_map<S, P>(identifiers: &[S], dir: P, warped: &WarpedFeature) -> Result<Vec<PathBuf>>
where
    S: AsRef<str>,
    P: AsRef<Path>,
{
    let uv = warped.uv_channels();
    save_batch(identifiers, dir.as_ref(), warped.batch_size(), |b| {
        let mut reversed = uv.index_axis(Axis(0), b);
        reversed.invert_axis(Axis(0));
        array_to_rgb_image(reversed)
    })
}

fn save_batch<S, F>(identifiers: &[S], dir: &Path, batch_size: usize, render: F) -> Result<Vec<PathBuf>>
where
    S: AsRef<str>,
    F: Fn(usize) -> image::RgbImage,
{
    if identifiers.len() != batch_size {
        return Err(WarpError::IdentifierMismatch {
            identifiers: identifiers.len(),
            batch: batch_size,
        });
    }
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(batch_size);
    for (b, identifier) in identifiers.iter().enumerate() {
        let path = dir.join(output_name(identifier.as_ref()));
        let format = require_format(&path)?;
        render(b).save_with_format(&path, format.image_format())?;
        log::info!("saved {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Fraction of pixels of a raw IUV array with a non-zero part index.
pub fn foreground_fraction(raw_iuv: &Array3<f32>) -> f32 {
    let plane = raw_iuv.index_axis(Axis(0), 0);
    if plane.is_empty() {
        return 0.0;
    }
    let count = plane.iter().filter(|&&i| i > 0.0).count();
    count as f32 / plane.len() as f32
}
