use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureFrame;
use crate::compose::EncodedImage;
use crate::geometry::Selection;
use crate::planner::ReplayPlan;

/// Which capture path wrote a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    FullPage,
    Selection,
    ScrollingFrames,
    ScrollingRegenerate,
}

impl SourceKind {
    /// The tag used in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FullPage => "full_page",
            SourceKind::Selection => "selection",
            SourceKind::ScrollingFrames => "scrolling_frames",
            SourceKind::ScrollingRegenerate => "scrolling_regenerate",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::FullPage => write!(f, "full page"),
            SourceKind::Selection => write!(f, "selection"),
            SourceKind::ScrollingFrames => write!(f, "scrolling frames"),
            SourceKind::ScrollingRegenerate => write!(f, "scrolling (regenerate)"),
        }
    }
}

/// The content of a pending record, one variant per capture path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum PendingPayload {
    /// A finished visible-area shot.
    FullPage { main_image: EncodedImage },
    /// A visible-area shot still to be cropped to `selection`.
    Selection {
        main_image: EncodedImage,
        selection: Selection,
    },
    /// Frames whose stitching was deferred to the reader.
    ScrollingFrames {
        #[serde(default)]
        main_image: Option<EncodedImage>,
        frames: Vec<CaptureFrame>,
        overlap_px: u32,
        #[serde(default)]
        selection: Option<Selection>,
    },
    /// Frames were too large to persist; the reader re-drives the capture
    /// from `replay`.
    ScrollingRegenerate {
        #[serde(default)]
        main_image: Option<EncodedImage>,
        replay: ReplayPlan,
        #[serde(default)]
        selection: Option<Selection>,
    },
}

/// A persisted "capture finished" record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub captured_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: PendingPayload,
}

/// The identifying fields of a record, readable without the images.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingHeader {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub captured_at: DateTime<Utc>,
    pub source_kind: Option<SourceKind>,
}

impl PendingPayload {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            PendingPayload::FullPage { .. } => SourceKind::FullPage,
            PendingPayload::Selection { .. } => SourceKind::Selection,
            PendingPayload::ScrollingFrames { .. } => SourceKind::ScrollingFrames,
            PendingPayload::ScrollingRegenerate { .. } => SourceKind::ScrollingRegenerate,
        }
    }

    pub fn should_stitch(&self) -> bool {
        matches!(
            self,
            PendingPayload::ScrollingFrames { .. } | PendingPayload::ScrollingRegenerate { .. }
        )
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            PendingPayload::FullPage { .. } => None,
            PendingPayload::Selection { selection, .. } => Some(selection),
            PendingPayload::ScrollingFrames { selection, .. }
            | PendingPayload::ScrollingRegenerate { selection, .. } => selection.as_ref(),
        }
    }

    pub fn needs_cropping(&self) -> bool {
        self.selection().is_some()
    }
}

impl PendingResult {
    pub fn new(id: impl Into<String>, captured_at: DateTime<Utc>, payload: PendingPayload) -> Self {
        Self {
            id: id.into(),
            captured_at,
            payload,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.payload.source_kind()
    }

    pub fn should_stitch(&self) -> bool {
        self.payload.should_stitch()
    }

    pub fn needs_cropping(&self) -> bool {
        self.payload.needs_cropping()
    }
}

/// Indices of `results`, most authoritative first.
///
/// Records that still need stitching beat finished ones regardless of age.
/// Within the same group the latest `captured_at` wins.
pub fn authority_order(results: &[PendingResult]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by_key(|&i| {
        let result = &results[i];
        std::cmp::Reverse((result.should_stitch(), result.captured_at))
    });
    order
}

/// Index of the authoritative record.
pub fn select_authoritative(results: &[PendingResult]) -> Option<usize> {
    authority_order(results).first().copied()
}
