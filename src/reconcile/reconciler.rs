//! Picks the authoritative pending record and finishes its compositing.

use chrono::{DateTime, Utc};
use tokio::time::{sleep, timeout};

use crate::capture::CaptureDriver;
use crate::compose::{EncodedImage, crop_encoded, crop_width_encoded, stitch_frames};
use crate::config::CaptureConfig;
use crate::error::ReconcileError;
use crate::geometry::Selection;
use crate::host::CaptureHost;
use crate::planner::ReplayPlan;
use crate::reconcile::pending::{PendingPayload, PendingResult, SourceKind, authority_order};
use crate::reconcile::store::PendingStore;

/// A way in which the final image is worse than intended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// A frame could not be decoded; a single unstitched image is shown.
    StitchFailure,
    /// The crop could not be applied; the uncropped image is shown.
    CropFailed,
    /// Regeneration hit its time ceiling; the persisted main image is shown.
    RegenerationTimeout,
    /// Regeneration failed or had no live page; the persisted main image is shown.
    RegenerationFailed,
}

/// The image to present, and how it came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalImage {
    pub image: EncodedImage,
    pub source: SourceKind,
    pub captured_at: DateTime<Utc>,
    pub degradations: Vec<Degradation>,
}

impl FinalImage {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Final(FinalImage),
    /// Nothing to reconcile yet; retry after a backoff.
    AwaitingData,
}

/// Runs in the results context.
///
/// `host` is the live page used for regeneration. Without one, regeneration
/// degrades straight to the persisted main image.
pub struct ResultReconciler<'a> {
    config: &'a CaptureConfig,
    host: Option<&'a dyn CaptureHost>,
}

impl<'a> ResultReconciler<'a> {
    pub fn new(config: &'a CaptureConfig) -> Self {
        Self { config, host: None }
    }

    pub fn with_host(mut self, host: &'a dyn CaptureHost) -> Self {
        self.host = Some(host);
        self
    }

    /// Reconciles a snapshot of pending records.
    ///
    /// When the authoritative record yields no image at all, the next ones
    /// are tried in authority order, so a superseded image still beats nothing.
    pub async fn reconcile(
        &self,
        pending: Vec<PendingResult>,
    ) -> Result<Reconciled, ReconcileError> {
        let order = authority_order(&pending);
        let total = pending.len();
        let mut slots: Vec<Option<PendingResult>> = pending.into_iter().map(Some).collect();
        let mut last_error = None;

        for (rank, index) in order.into_iter().enumerate() {
            let Some(candidate) = slots[index].take() else {
                continue;
            };
            log::info!(
                "Reconciling {} ({}, captured {}), rank {} of {}",
                candidate.id,
                candidate.source_kind(),
                candidate.captured_at,
                rank + 1,
                total
            );
            let id = candidate.id.clone();
            match self.finish(candidate).await {
                Ok(image) => return Ok(Reconciled::Final(image)),
                Err(e) => {
                    log::warn!("Result {} produced no image: {}", id, e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(Reconciled::AwaitingData),
        }
    }

    /// Reads the store until records appear, then finishes the snapshot.
    ///
    /// The records of the snapshot are cleared once an image has been
    /// produced, so none of them is processed twice. If none of them yields
    /// an image they are left in the store.
    pub async fn reconcile_store(
        &self,
        store: &dyn PendingStore,
    ) -> Result<FinalImage, ReconcileError> {
        let max_attempts = self.config.reconcile.max_load_attempts.max(1);
        for attempt in 1..=max_attempts {
            let pending = store.read_all()?;
            if pending.is_empty() {
                if attempt < max_attempts {
                    let delay = self.config.reconcile.load_backoff(attempt);
                    log::info!(
                        "No pending data yet (attempt {}/{}), retrying in {}ms",
                        attempt,
                        max_attempts,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                continue;
            }

            let ids: Vec<String> = pending.iter().map(|r| r.id.clone()).collect();
            if let Reconciled::Final(image) = self.reconcile(pending).await? {
                for id in &ids {
                    if let Err(e) = store.clear(id) {
                        log::warn!("Failed to clear pending result {}: {}", id, e);
                    }
                }
                return Ok(image);
            }
        }
        log::error!("No pending data after {} attempts", max_attempts);
        Err(ReconcileError::NoPendingData {
            attempts: max_attempts,
        })
    }

    async fn finish(&self, result: PendingResult) -> Result<FinalImage, ReconcileError> {
        let PendingResult {
            id,
            captured_at,
            payload,
        } = result;
        let source = payload.source_kind();
        let mut degradations = Vec::new();

        let image = match payload {
            PendingPayload::FullPage { main_image } => main_image,
            PendingPayload::Selection {
                main_image,
                selection,
            } => match crop_encoded(&main_image, &selection.viewport_rect()) {
                Ok(cropped) => cropped,
                Err(e) => {
                    log::warn!("Selection crop failed, showing full shot: {}", e);
                    degradations.push(Degradation::CropFailed);
                    main_image
                }
            },
            PendingPayload::ScrollingFrames {
                main_image,
                mut frames,
                overlap_px,
                selection,
            } => {
                frames.sort_by_key(|f| f.index);
                // Only kept when nothing else could stand in for a failed stitch
                let first_frame = if main_image.is_some() {
                    None
                } else {
                    frames.first().map(|f| f.image.clone())
                };
                match stitch_frames(frames, overlap_px) {
                    Ok(stitched) => self.crop_to_selection(stitched, selection, &mut degradations),
                    Err(e) => {
                        log::warn!("Stitching failed, showing a single frame: {}", e);
                        degradations.push(Degradation::StitchFailure);
                        main_image
                            .or(first_frame)
                            .ok_or_else(|| ReconcileError::NoImage { id: id.clone() })?
                    }
                }
            }
            PendingPayload::ScrollingRegenerate {
                main_image,
                replay,
                selection,
            } => match self.regenerate_with_ceiling(&replay).await {
                Ok(stitched) => self.crop_to_selection(stitched, selection, &mut degradations),
                Err(degradation) => {
                    degradations.push(degradation);
                    main_image.ok_or_else(|| ReconcileError::NoImage { id: id.clone() })?
                }
            },
        };

        if !degradations.is_empty() {
            log::warn!("Result {} degraded: {:?}", id, degradations);
        }
        Ok(FinalImage {
            image,
            source,
            captured_at,
            degradations,
        })
    }

    /// Width-only crop of a stitched image to the selection's columns.
    fn crop_to_selection(
        &self,
        stitched: EncodedImage,
        selection: Option<Selection>,
        degradations: &mut Vec<Degradation>,
    ) -> EncodedImage {
        let Some(selection) = selection else {
            return stitched;
        };
        match crop_width_encoded(&stitched, selection.x as i64, selection.width) {
            Ok(cropped) => cropped,
            Err(e) => {
                log::warn!("Width crop failed, showing full stitch: {}", e);
                degradations.push(Degradation::CropFailed);
                stitched
            }
        }
    }

    /// Re-drives the capture from `replay`, abandoning it at the ceiling.
    async fn regenerate_with_ceiling(&self, replay: &ReplayPlan) -> Result<EncodedImage, Degradation> {
        let Some(host) = self.host else {
            log::warn!("No live page to regenerate from");
            return Err(Degradation::RegenerationFailed);
        };
        let ceiling = self.config.reconcile.regeneration_timeout();
        log::info!(
            "Regenerating {} steps of {}px (ceiling {}s)",
            replay.total_steps,
            replay.scroll_step,
            ceiling.as_secs()
        );
        match timeout(ceiling, self.regenerate(host, replay)).await {
            Ok(Ok(image)) => Ok(image),
            Ok(Err(e)) => {
                log::warn!("Regeneration failed: {}", e);
                Err(Degradation::RegenerationFailed)
            }
            Err(_) => {
                log::warn!("Regeneration timed out after {}s", ceiling.as_secs());
                Err(Degradation::RegenerationTimeout)
            }
        }
    }

    async fn regenerate(
        &self,
        host: &dyn CaptureHost,
        replay: &ReplayPlan,
    ) -> Result<EncodedImage, ReconcileError> {
        sleep(std::time::Duration::from_millis(
            self.config.reconcile.regeneration_warmup_ms,
        ))
        .await;
        let plan = replay.to_plan(self.config.planner.overlap_ratio)?;
        let mut driver = CaptureDriver::new(host, self.config);
        let capture = driver.capture_frames(&plan).await?;
        Ok(stitch_frames(capture.frames, plan.stitch_overlap())?)
    }
}
