//! Cropping with silent clamping to the image bounds.

use image::{RgbaImage, imageops};

use crate::compose::encoded::{EncodedImage, encode_png};
use crate::error::CompositeError;
use crate::geometry::PixelRect;

/// Clamps `rect` to a `width` x `height` image, returning `(x, y, w, h)`.
fn clamp_rect(rect: &PixelRect, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let clamp_span = |start: i64, len: u32, bound: u32| {
        let lo = start.clamp(0, bound as i64);
        let hi = (start + len as i64).clamp(0, bound as i64);
        (lo as u32, (hi - lo) as u32)
    };
    let (x, w) = clamp_span(rect.x, rect.width, width);
    let (y, h) = clamp_span(rect.y, rect.height, height);
    (x, y, w, h)
}

/// Crops to `rect` clamped to the image. Never fails; the result may be
/// smaller than requested, or empty when `rect` misses the image entirely.
pub fn crop(image: &RgbaImage, rect: &PixelRect) -> RgbaImage {
    let (x, y, w, h) = clamp_rect(rect, image.width(), image.height());
    imageops::crop_imm(image, x, y, w, h).to_image()
}

/// Keeps the full height and crops only horizontally.
pub fn crop_width(image: &RgbaImage, x: i64, width: u32) -> RgbaImage {
    crop(image, &PixelRect::new(x, 0, width, image.height()))
}

/// Decodes, crops and re-encodes.
///
/// An empty crop cannot be encoded and is reported as `EmptyCrop`.
pub fn crop_encoded(image: &EncodedImage, rect: &PixelRect) -> Result<EncodedImage, CompositeError> {
    let decoded = image.decode()?;
    let cropped = crop(&decoded, rect);
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(CompositeError::EmptyCrop {
            width: decoded.width(),
            height: decoded.height(),
        });
    }
    encode_png(&cropped)
}

/// Encoded form of [`crop_width`].
pub fn crop_width_encoded(
    image: &EncodedImage,
    x: i64,
    width: u32,
) -> Result<EncodedImage, CompositeError> {
    let decoded = image.decode()?;
    let rect = PixelRect::new(x, 0, width, decoded.height());
    let cropped = crop(&decoded, &rect);
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(CompositeError::EmptyCrop {
            width: decoded.width(),
            height: decoded.height(),
        });
    }
    encode_png(&cropped)
}
