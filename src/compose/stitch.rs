//! Vertical stitching of captured frames.

use image::{RgbaImage, imageops};

use crate::capture::CaptureFrame;
use crate::compose::encoded::{EncodedImage, decode_rgba, encode_png};
use crate::error::CompositeError;

/// Stitches frames top to bottom, dropping `overlap` rows between neighbours.
///
/// Canvas width is the widest frame; narrower frames are centered. Each later
/// frame is drawn over the bottom `overlap` rows of the one before it, so the
/// later copy of duplicated content wins. The overlap is clamped to the
/// shortest frame. A single frame is returned unchanged.
pub fn stitch_images(frames: Vec<RgbaImage>, overlap: u32) -> Result<RgbaImage, CompositeError> {
    let mut frames = frames;
    match frames.len() {
        0 => return Err(CompositeError::NoFrames),
        1 => return frames.pop().ok_or(CompositeError::NoFrames),
        _ => {}
    }

    let width = frames.iter().map(|f| f.width()).max().unwrap_or(0);
    let min_height = frames.iter().map(|f| f.height()).min().unwrap_or(0);
    let overlap = overlap.min(min_height);
    let height = frames[0].height()
        + frames[1..]
            .iter()
            .map(|f| f.height() - overlap)
            .sum::<u32>();

    log::debug!(
        "Stitching {} frames into {}x{} (overlap {}px)",
        frames.len(),
        width,
        height,
        overlap
    );

    let mut canvas = RgbaImage::new(width, height);
    let mut y: i64 = 0;
    for frame in &frames {
        let x = ((width - frame.width()) / 2) as i64;
        imageops::replace(&mut canvas, frame, x, y);
        y += (frame.height() - overlap) as i64;
    }
    Ok(canvas)
}

/// Decodes, stitches and re-encodes captured frames.
///
/// Consumes the frames. A single frame's bytes are returned as they are.
pub fn stitch_frames(
    frames: Vec<CaptureFrame>,
    overlap: u32,
) -> Result<EncodedImage, CompositeError> {
    let mut frames = frames;
    if frames.len() <= 1 {
        return frames
            .pop()
            .map(|frame| frame.image)
            .ok_or(CompositeError::NoFrames);
    }

    let decoded = frames
        .into_iter()
        .enumerate()
        .map(|(index, frame)| {
            decode_rgba(frame.image.as_bytes())
                .map_err(|source| CompositeError::StitchFailure { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    encode_png(&stitch_images(decoded, overlap)?)
}
