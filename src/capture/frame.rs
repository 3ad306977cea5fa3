use serde::{Deserialize, Serialize};

use crate::compose::EncodedImage;
use crate::error::{CaptureError, HostError};
use crate::planner::ScrollPlan;

/// One captured viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFrame {
    /// Index of the scroll target this frame was taken at
    pub index: usize,
    pub image: EncodedImage,
    /// Scroll offset the page reported when the frame was taken
    pub captured_at_y: u32,
}

/// Non-fatal problems during a scrolling capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureWarning {
    /// A later step failed after all retries and was left out.
    SkippedStep { index: usize, error: HostError },
    /// Fewer than half of the planned steps produced a frame.
    LowSuccessRate { captured: usize, planned: usize },
}

impl std::fmt::Display for CaptureWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureWarning::SkippedStep { index, error } => {
                write!(f, "step {} skipped: {}", index + 1, error)
            }
            CaptureWarning::LowSuccessRate { captured, planned } => {
                write!(f, "only {} of {} steps captured", captured, planned)
            }
        }
    }
}

/// Frames of a scrolling capture, ordered by scroll position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrolledCapture {
    pub frames: Vec<CaptureFrame>,
    pub plan: ScrollPlan,
    pub warnings: Vec<CaptureWarning>,
}

impl ScrolledCapture {
    /// Total encoded size of all frames.
    pub fn frame_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.image.len()).sum()
    }
}

/// What a capture run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// One visible-area image. `fallback` holds the failure that forced it,
    /// if the single shot was not the plan. `scroll_y` is the page offset
    /// the image was taken at when the driver had moved the page.
    Single {
        image: EncodedImage,
        fallback: Option<CaptureError>,
        scroll_y: Option<u32>,
    },
    Scrolled(ScrolledCapture),
}
