//! Rounded-corner rendering.

use image::RgbaImage;

use crate::compose::encoded::{EncodedImage, encode_png};
use crate::error::CompositeError;

/// Radius actually applied: `radius` limited to `max_radius` and half the
/// shorter side.
pub fn effective_radius(width: u32, height: u32, radius: u32, max_radius: u32) -> u32 {
    radius.min(max_radius).min(width.min(height) / 2)
}

/// Clips the image to a rounded rectangle by fading alpha outside the arcs.
///
/// Edge pixels get partial alpha according to how much of them lies inside
/// the arc. A zero radius returns the image untouched.
pub fn round_corners(image: RgbaImage, radius: u32, max_radius: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let r = effective_radius(width, height, radius, max_radius);
    if r == 0 {
        return image;
    }

    let mut image = image;
    let rf = r as f32;
    for y in 0..r {
        for x in 0..r {
            let dx = rf - (x as f32 + 0.5);
            let dy = rf - (y as f32 + 0.5);
            let coverage = (rf - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
            if coverage >= 1.0 {
                continue;
            }
            for (px, py) in [
                (x, y),
                (width - 1 - x, y),
                (x, height - 1 - y),
                (width - 1 - x, height - 1 - y),
            ] {
                let pixel = image.get_pixel_mut(px, py);
                pixel[3] = (pixel[3] as f32 * coverage).round() as u8;
            }
        }
    }
    image
}

/// Encoded form of [`round_corners`]. A no-op radius hands back the input
/// bytes without decoding.
pub fn round_corners_encoded(
    image: EncodedImage,
    radius: u32,
    max_radius: u32,
) -> Result<EncodedImage, CompositeError> {
    if radius.min(max_radius) == 0 {
        return Ok(image);
    }
    let decoded = image.decode()?;
    if effective_radius(decoded.width(), decoded.height(), radius, max_radius) == 0 {
        return Ok(image);
    }
    encode_png(&round_corners(decoded, radius, max_radius))
}
