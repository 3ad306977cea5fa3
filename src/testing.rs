//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::compose::{EncodedImage, encode_png};
use crate::error::HostError;
use crate::geometry::PageMetrics;
use crate::host::{CaptureHost, ScrollAck};

/// Encodes a solid-colour PNG.
pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> EncodedImage {
    encode_png(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
}

/// A scripted page.
///
/// Capture results are served from a queue; once it runs dry every capture
/// returns a default frame. Scroll offsets and capture start times are recorded.
pub struct ScriptedHost {
    metrics: Result<PageMetrics, HostError>,
    captures: Mutex<VecDeque<Result<EncodedImage, HostError>>>,
    default_frame: EncodedImage,
    capture_delay: Option<Duration>,
    scroll_error: Option<HostError>,
    scrolls: Mutex<Vec<u32>>,
    capture_times: Mutex<Vec<Instant>>,
}

impl ScriptedHost {
    pub fn new(metrics: PageMetrics) -> Self {
        Self {
            metrics: Ok(metrics),
            captures: Mutex::new(VecDeque::new()),
            default_frame: solid_png(4, 4, [200, 200, 200, 255]),
            capture_delay: None,
            scroll_error: None,
            scrolls: Mutex::new(Vec::new()),
            capture_times: Mutex::new(Vec::new()),
        }
    }

    /// A page of the given height and viewport.
    pub fn page(scroll_height: u32, viewport_height: u32) -> Self {
        Self::new(PageMetrics {
            document_scroll_height: scroll_height,
            inner_height: viewport_height,
            viewport_width: 1280,
            ..Default::default()
        })
    }

    /// A page whose metrics cannot be read.
    pub fn unreachable(error: HostError) -> Self {
        let mut host = Self::new(PageMetrics::default());
        host.metrics = Err(error);
        host
    }

    pub fn with_captures(self, captures: Vec<Result<EncodedImage, HostError>>) -> Self {
        *self.captures.lock().unwrap() = captures.into();
        self
    }

    pub fn with_default_frame(mut self, frame: EncodedImage) -> Self {
        self.default_frame = frame;
        self
    }

    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = Some(delay);
        self
    }

    pub fn with_scroll_error(mut self, error: HostError) -> Self {
        self.scroll_error = Some(error);
        self
    }

    pub fn scrolls(&self) -> Vec<u32> {
        self.scrolls.lock().unwrap().clone()
    }

    pub fn capture_times(&self) -> Vec<Instant> {
        self.capture_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureHost for ScriptedHost {
    async fn probe_metrics(&self) -> Result<PageMetrics, HostError> {
        self.metrics.clone()
    }

    async fn scroll_to(&self, y: u32) -> Result<ScrollAck, HostError> {
        self.scrolls.lock().unwrap().push(y);
        if let Some(err) = &self.scroll_error {
            return Err(err.clone());
        }
        let max = self
            .metrics
            .as_ref()
            .map(|m| m.geometry().max_scroll_top)
            .unwrap_or(0);
        Ok(ScrollAck {
            requested_y: y,
            actual_y: y.min(max),
        })
    }

    async fn capture_visible(&self) -> Result<EncodedImage, HostError> {
        self.capture_times.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.capture_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.captures.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.default_frame.clone()))
    }
}
