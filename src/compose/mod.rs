//! Image compositing: stitch, crop, rounded corners.
//!
//! All images entering or leaving this module as blobs are [`EncodedImage`]s;
//! pixel work happens on `image::RgbaImage`.

pub mod corners;
pub mod crop;
pub mod encoded;
pub mod stitch;

pub use corners::{effective_radius, round_corners, round_corners_encoded};
pub use crop::{crop, crop_encoded, crop_width, crop_width_encoded};
pub use encoded::{EncodedImage, encode_png};
pub use stitch::{stitch_frames, stitch_images};
