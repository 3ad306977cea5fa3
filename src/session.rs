//! Capture entry points.
//!
//! A [`CaptureRequest`] is the message an entry point (toolbar button,
//! selection overlay) sends to the coordinating context. The session runs the
//! capture and leaves a [`PendingResult`] in the store for the results side.
//! It carries no state between requests beyond a sequence counter for ids.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{CaptureDriver, CaptureOutcome, ScrolledCapture};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, HostError, StoreError};
use crate::geometry::Selection;
use crate::host::CaptureHost;
use crate::reconcile::{PendingPayload, PendingResult, PendingStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureRequest {
    /// Just the visible area, no scrolling.
    VisibleArea,
    /// The whole page, scrolling if it is taller than the viewport.
    FullPage,
    /// A user-drawn region, optionally scrolling to cover content below it.
    Selection { selection: Selection, scroll: bool },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("visible-area capture failed: {0}")]
    Host(#[from] HostError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CaptureSession<'a, H: CaptureHost + ?Sized> {
    host: &'a H,
    store: &'a dyn PendingStore,
    config: &'a CaptureConfig,
    sequence: u64,
}

impl<'a, H: CaptureHost + ?Sized> CaptureSession<'a, H> {
    pub fn new(host: &'a H, store: &'a dyn PendingStore, config: &'a CaptureConfig) -> Self {
        Self {
            host,
            store,
            config,
            sequence: 0,
        }
    }

    /// Captures according to `request` and persists the record.
    pub async fn handle(&mut self, request: CaptureRequest) -> Result<PendingResult, SessionError> {
        log::info!("Handling capture request: {:?}", request);
        let mut driver = CaptureDriver::new(self.host, self.config);

        let payload = match request {
            CaptureRequest::VisibleArea => PendingPayload::FullPage {
                main_image: driver.capture_single().await?,
            },
            CaptureRequest::FullPage => match driver.capture(None).await? {
                CaptureOutcome::Single { image, .. } => PendingPayload::FullPage { main_image: image },
                CaptureOutcome::Scrolled(capture) => self.scrolled_payload(capture, None),
            },
            CaptureRequest::Selection {
                selection,
                scroll: false,
            } => PendingPayload::Selection {
                main_image: driver.capture_single().await?,
                selection,
            },
            CaptureRequest::Selection {
                selection,
                scroll: true,
            } => match driver.capture(Some(&selection)).await? {
                CaptureOutcome::Single {
                    image, scroll_y, ..
                } => PendingPayload::Selection {
                    main_image: image,
                    // Crop from where the shot was actually taken
                    selection: scroll_y.map_or(selection, |y| selection.rebased(y)),
                },
                CaptureOutcome::Scrolled(capture) => self.scrolled_payload(capture, Some(selection)),
            },
        };

        let captured_at = Utc::now();
        self.sequence += 1;
        let id = format!(
            "{}-{}-{}",
            payload.source_kind().as_str(),
            captured_at.timestamp_millis(),
            self.sequence
        );
        let result = PendingResult::new(id, captured_at, payload);
        self.store.persist(&result)?;
        log::info!("Persisted {} ({})", result.id, result.source_kind());
        Ok(result)
    }

    /// Moves the frames into a record, or keeps only the replay parameters
    /// and the first frame when the frames would not fit in the store.
    fn scrolled_payload(&self, capture: ScrolledCapture, selection: Option<Selection>) -> PendingPayload {
        let bytes = capture.frame_bytes();
        if bytes > self.config.max_persisted_frame_bytes {
            log::warn!(
                "Frames total {} bytes (limit {}), persisting replay parameters instead",
                bytes,
                self.config.max_persisted_frame_bytes
            );
            let replay = capture.plan.replay();
            return PendingPayload::ScrollingRegenerate {
                main_image: capture.frames.into_iter().next().map(|f| f.image),
                replay,
                selection,
            };
        }
        PendingPayload::ScrollingFrames {
            main_image: None,
            overlap_px: capture.plan.stitch_overlap(),
            frames: capture.frames,
            selection,
        }
    }
}
