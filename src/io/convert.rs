//! Conversion between channel-first float arrays and `image` buffers.
//!
//! - **ndarray**: `[channel, row, col]` with dimensions `(3, height, width)`
//! - **image crate**: pixel `(x, y)` with dimensions `(width, height)`

use image::{Rgb, RgbImage};
use ndarray::{Array3, ArrayView3};

/// Convert an RGB image to a `(3, H, W)` array of byte values (`0.0..=255.0`).
pub fn rgb_image_to_array(img: &RgbImage) -> Array3<f32> {
    let (width, height) = img.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        img.get_pixel(x as u32, y as u32)[c] as f32
    })
}

/// Convert a `(3, H, W)` array of values in `[0, 1]` to an RGB image.
///
/// Each value is scaled by 255, rounded and saturated into `0..=255`; NaN
/// becomes 0.
pub fn array_to_rgb_image(arr: ArrayView3<'_, f32>) -> RgbImage {
    let (channels, height, width) = arr.dim();
    debug_assert_eq!(channels, 3);

    let mut img = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let px = [
                to_byte(arr[[0, y, x]]),
                to_byte(arr[[1, y, x]]),
                to_byte(arr[[2, y, x]]),
            ];
            img.put_pixel(x as u32, y as u32, Rgb(px));
        }
    }
    img
}

#[inline]
fn to_byte(value: f32) -> u8 {
    // `as u8` saturates and maps NaN to 0.
    (value * 255.0).round() as u8
}
