//! Page measurements and the rectangles that describe regions of a page.
//!
//! - [`PageMetrics`]: raw layout properties as reported by the page
//! - [`PageGeometry`]: the reduced scroll geometry the planner works on
//! - [`Selection`]: a user-drawn region of interest
//! - [`PixelRect`]: an unclamped crop rectangle in image pixels

pub mod probe;

pub use probe::probe;

use serde::{Deserialize, Serialize};

/// Scroll geometry of a page.
///
/// `max_scroll_top` is always `scroll_height - viewport_height`, floored at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub scroll_height: u32,
    pub viewport_height: u32,
    pub max_scroll_top: u32,
}

impl PageGeometry {
    pub fn new(scroll_height: u32, viewport_height: u32) -> Self {
        Self {
            scroll_height,
            viewport_height,
            max_scroll_top: scroll_height.saturating_sub(viewport_height),
        }
    }

    /// Whether the scrollable extent exceeds `threshold_px`.
    pub fn is_scrollable(&self, threshold_px: u32) -> bool {
        self.max_scroll_top > threshold_px
    }
}

/// Raw layout properties read from the page.
///
/// Pages disagree about which of these is authoritative, so several redundant
/// heights are collected and reduced by [`PageMetrics::geometry`]. Fields the
/// page did not report deserialize as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMetrics {
    /// `document.body.scrollHeight`
    pub body_scroll_height: u32,
    /// `document.documentElement.scrollHeight`
    pub document_scroll_height: u32,
    /// `document.body.offsetHeight`
    pub body_offset_height: u32,
    /// `document.documentElement.offsetHeight`
    pub document_offset_height: u32,
    /// `window.innerHeight`
    pub inner_height: u32,
    /// `document.documentElement.clientHeight`
    pub client_height: u32,
    /// Current vertical scroll offset
    pub scroll_top: u32,
    /// `window.innerWidth`
    pub viewport_width: u32,
}

impl PageMetrics {
    /// Reduces the raw metrics: the tallest reported height wins, and the
    /// viewport is `inner_height` unless the page reported 0 for it.
    pub fn geometry(&self) -> PageGeometry {
        let scroll_height = self
            .body_scroll_height
            .max(self.document_scroll_height)
            .max(self.body_offset_height)
            .max(self.document_offset_height);
        let viewport_height = if self.inner_height > 0 {
            self.inner_height
        } else {
            self.client_height
        };
        PageGeometry::new(scroll_height, viewport_height)
    }
}

/// The coordinate space a selection was drawn in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Relative to the visible area, page assumed unscrolled.
    #[default]
    Viewport,
    /// Drawn while the page was scrolled by `scroll_offset`.
    Document { scroll_offset: u32 },
}

/// A user-drawn rectangle. Width and height are always positive.
///
/// `x` and `y` are relative to the visible area at drawing time; the
/// coordinate space says how to map them into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub space: CoordinateSpace,
}

impl Selection {
    /// Creates a viewport-space selection. Returns `None` for empty rectangles.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
            space: CoordinateSpace::Viewport,
        })
    }

    /// Marks the selection as drawn while the page was scrolled.
    pub fn in_document(mut self, scroll_offset: u32) -> Self {
        self.space = CoordinateSpace::Document { scroll_offset };
        self
    }

    /// Page offset at the time the selection was drawn.
    pub fn scroll_offset(&self) -> u32 {
        match self.space {
            CoordinateSpace::Viewport => 0,
            CoordinateSpace::Document { scroll_offset } => scroll_offset,
        }
    }

    /// The same document rectangle, as seen with the page at `scroll_offset`.
    pub fn rebased(self, scroll_offset: u32) -> Self {
        let y = (self.document_y() - scroll_offset as i64).clamp(i32::MIN as i64, i32::MAX as i64);
        Self {
            y: y as i32,
            space: CoordinateSpace::Document { scroll_offset },
            ..self
        }
    }

    /// Top edge in document coordinates.
    pub fn document_y(&self) -> i64 {
        match self.space {
            CoordinateSpace::Viewport => self.y as i64,
            CoordinateSpace::Document { scroll_offset } => self.y as i64 + scroll_offset as i64,
        }
    }

    /// Bottom edge (exclusive) in document coordinates.
    pub fn document_bottom(&self) -> i64 {
        self.document_y() + self.height as i64
    }

    /// The rectangle within the single shot that was visible when the
    /// selection was drawn.
    pub fn viewport_rect(&self) -> PixelRect {
        PixelRect::new(self.x as i64, self.y as i64, self.width, self.height)
    }

    /// The rectangle within a stitched image that starts at document row 0.
    pub fn document_rect(&self) -> PixelRect {
        PixelRect::new(self.x as i64, self.document_y(), self.width, self.height)
    }
}

/// A crop rectangle in image pixels. May be negative or exceed the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
