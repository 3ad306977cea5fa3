//! Error types for every stage of the capture pipeline.
//!
//! Capture-level host failures are retried inside the driver and only surface
//! once the retry budget is spent. Planning and coverage failures trigger the
//! single-shot fallback. Only `CaptureError::FallbackFailed` and
//! `ReconcileError::NoPendingData` mean that no image at all could be produced.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// A failure reported by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The capture primitive's per-second call limit was hit.
    #[error("capture rate limit exceeded: {0}")]
    RateLimited(String),
    /// The host refused the capture (permission not granted or not in effect).
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The page context could not be reached.
    #[error("page context unreachable: {0}")]
    Unreachable(String),
    /// Any other, presumably transient, failure.
    #[error("capture failed: {0}")]
    Transient(String),
}

struct HostErrorPatterns {
    rate_limited: Regex,
    permission: Regex,
    unreachable: Regex,
}

fn patterns() -> &'static HostErrorPatterns {
    static PATTERNS: OnceLock<HostErrorPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HostErrorPatterns {
        rate_limited: Regex::new(r"(?i)MAX_CAPTURE_VISIBLE_TAB_CALLS_PER_SECOND|rate.?limit")
            .expect("rate limit pattern is valid"),
        permission: Regex::new(r"(?i)not in effect|permission").expect("permission pattern is valid"),
        unreachable: Regex::new(
            r"(?i)could not establish connection|receiving end does not exist|no tab with id",
        )
        .expect("unreachable pattern is valid"),
    })
}

impl HostError {
    /// Maps a raw host error message to its category.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let patterns = patterns();
        if patterns.rate_limited.is_match(&message) {
            HostError::RateLimited(message)
        } else if patterns.permission.is_match(&message) {
            HostError::PermissionDenied(message)
        } else if patterns.unreachable.is_match(&message) {
            HostError::Unreachable(message)
        } else {
            HostError::Transient(message)
        }
    }
}

/// A failed capture attempt as seen by callers of the driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("page context unreachable: {0}")]
    PageUnreachable(String),
    #[error("scroll planning failed: {0}")]
    PlanningError(String),
    /// One of the first two steps failed after exhausting its retries.
    #[error("insufficient coverage: step {step} failed: {source}")]
    InsufficientCoverage { step: usize, source: HostError },
    #[error("no frames were captured")]
    NoFramesCaptured,
    /// The run failed and the single-shot fallback failed as well.
    #[error("{reason}; single-shot fallback also failed: {fallback}")]
    FallbackFailed {
        reason: Box<CaptureError>,
        fallback: HostError,
    },
}

/// Image decoding, compositing, or encoding failures.
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("no frames to stitch")]
    NoFrames,
    #[error("failed to decode frame {index}: {source}")]
    StitchFailure {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("invalid image data URL: {0}")]
    InvalidDataUrl(String),
    #[error("crop rectangle lies entirely outside the {width}x{height} image")]
    EmptyCrop { width: u32, height: u32 },
}

/// Pending-result store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize pending result: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to persist pending result: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Terminal failures on the results side.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no capture data found after {attempts} attempts")]
    NoPendingData { attempts: u32 },
    #[error("pending result '{id}' has no usable image")]
    NoImage { id: String },
    #[error("regeneration failed: {0}")]
    Regeneration(#[from] CaptureError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
