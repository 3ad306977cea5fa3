//! The boundary to the host platform.
//!
//! Page scripting (geometry queries, scrolling) and the rate-limited
//! visible-area capture primitive are provided by whoever embeds the core.
//! Everything above this trait is host-agnostic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::compose::EncodedImage;
use crate::error::HostError;
use crate::geometry::PageMetrics;

/// Acknowledgement of a scroll request.
///
/// The page clamps scroll offsets itself, so `actual_y` may be smaller than
/// `requested_y` near the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollAck {
    pub requested_y: u32,
    pub actual_y: u32,
}

impl ScrollAck {
    /// Ack for a page that honoured the request exactly.
    pub fn exact(y: u32) -> Self {
        Self {
            requested_y: y,
            actual_y: y,
        }
    }
}

#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Reads raw layout measurements from the page.
    async fn probe_metrics(&self) -> Result<PageMetrics, HostError>;

    /// Scrolls the page to `y`. Must succeed as a no-op if already there.
    async fn scroll_to(&self, y: u32) -> Result<ScrollAck, HostError>;

    /// Captures the currently visible area. Rate-limited by the host.
    async fn capture_visible(&self) -> Result<EncodedImage, HostError>;
}
