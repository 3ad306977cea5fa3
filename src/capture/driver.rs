//! The scroll → settle → capture loop.

use tokio::time::sleep;

use crate::capture::frame::{CaptureFrame, CaptureOutcome, CaptureWarning, ScrolledCapture};
use crate::capture::retry::{CapturePacer, backoff_for};
use crate::capture::state::DriverState;
use crate::compose::EncodedImage;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, HostError};
use crate::geometry::{Selection, probe};
use crate::host::CaptureHost;
use crate::planner::{PlanOutcome, ScrollPlan, ScrollPlanner};

/// Steps below this index are load-bearing: losing one aborts the run.
const REQUIRED_LEADING_STEPS: usize = 2;

/// Drives one capture against a host.
///
/// All capture calls of a driver are serialized and paced, so only one
/// driver should talk to a host at a time.
pub struct CaptureDriver<'a, H: CaptureHost + ?Sized> {
    host: &'a H,
    config: &'a CaptureConfig,
    state: DriverState,
    pacer: CapturePacer,
    /// Last known page offset once the driver has scrolled the page.
    position: Option<u32>,
}

impl<'a, H: CaptureHost + ?Sized> CaptureDriver<'a, H> {
    pub fn new(host: &'a H, config: &'a CaptureConfig) -> Self {
        Self {
            host,
            config,
            state: DriverState::Idle,
            pacer: CapturePacer::new(config.timing.min_capture_interval()),
            position: None,
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    fn transition(&mut self, next: DriverState) {
        log::debug!("Driver: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Probes, plans and captures the page.
    ///
    /// Any failure along the way falls back to a single visible-area shot;
    /// only when that fails too is an error returned. A page moved by the
    /// driver is scrolled back to where `selection` was drawn first.
    pub async fn capture(
        &mut self,
        selection: Option<&Selection>,
    ) -> Result<CaptureOutcome, CaptureError> {
        match self.run(selection).await {
            Ok(outcome) => {
                self.transition(DriverState::Done);
                Ok(outcome)
            }
            Err(reason) => self.fallback(reason, selection).await,
        }
    }

    async fn run(&mut self, selection: Option<&Selection>) -> Result<CaptureOutcome, CaptureError> {
        let geometry = probe(self.host).await?;
        let planner = ScrollPlanner::new(self.config.planner.clone());
        match planner.plan(&geometry, selection)? {
            PlanOutcome::NoScrollNeeded => {
                let image = self
                    .capture_single()
                    .await
                    .map_err(|source| CaptureError::InsufficientCoverage { step: 0, source })?;
                Ok(CaptureOutcome::Single {
                    image,
                    fallback: None,
                    scroll_y: None,
                })
            }
            PlanOutcome::Scroll(plan) => {
                Ok(CaptureOutcome::Scrolled(self.capture_frames(&plan).await?))
            }
        }
    }

    /// Captures every position of `plan`, without fallback.
    ///
    /// Frames come back in position order. A retried step fills its own slot.
    pub async fn capture_frames(&mut self, plan: &ScrollPlan) -> Result<ScrolledCapture, CaptureError> {
        let total = plan.positions.len();
        log::info!(
            "Starting scrolling capture: {} positions, step {}px",
            total,
            plan.scroll_step
        );

        self.transition(DriverState::ResettingScroll);
        match self.host.scroll_to(0).await {
            Ok(ack) => self.position = Some(ack.actual_y),
            Err(e) => log::warn!("Failed to reset scroll position: {}", e),
        }
        sleep(self.config.timing.reset_settle()).await;

        let mut frames = Vec::with_capacity(total);
        let mut warnings = Vec::new();

        for target in &plan.positions {
            self.transition(DriverState::Capturing {
                step: target.index,
                total,
            });

            let captured_at_y = match self.host.scroll_to(target.y).await {
                Ok(ack) => {
                    if ack.actual_y != ack.requested_y {
                        log::debug!(
                            "Page scrolled to {} instead of {}",
                            ack.actual_y,
                            ack.requested_y
                        );
                    }
                    ack.actual_y
                }
                Err(e) => {
                    log::warn!("Scroll to {} failed: {}. Capturing anyway.", target.y, e);
                    target.y
                }
            };
            self.position = Some(captured_at_y);
            sleep(self.config.timing.settle_for(target.is_edge)).await;

            match self.capture_with_retry(target.index).await {
                Ok(image) => {
                    log::info!(
                        "Captured step {}/{} at y={} ({} bytes)",
                        target.index + 1,
                        total,
                        captured_at_y,
                        image.len()
                    );
                    frames.push(CaptureFrame {
                        index: target.index,
                        image,
                        captured_at_y,
                    });
                }
                Err(source) if target.index < REQUIRED_LEADING_STEPS => {
                    let err = CaptureError::InsufficientCoverage {
                        step: target.index,
                        source,
                    };
                    log::error!("Aborting scrolling capture: {}", err);
                    self.transition(DriverState::Failed(err.to_string()));
                    return Err(err);
                }
                Err(error) => {
                    log::warn!(
                        "Skipping step {}/{} after {} attempts: {}",
                        target.index + 1,
                        total,
                        self.config.retry.max_attempts,
                        error
                    );
                    warnings.push(CaptureWarning::SkippedStep {
                        index: target.index,
                        error,
                    });
                }
            }
        }

        if frames.is_empty() {
            self.transition(DriverState::Failed(
                CaptureError::NoFramesCaptured.to_string(),
            ));
            return Err(CaptureError::NoFramesCaptured);
        }
        if frames.len() * 2 < total {
            log::warn!(
                "Low success rate: {} of {} steps captured, stitching what we have",
                frames.len(),
                total
            );
            warnings.push(CaptureWarning::LowSuccessRate {
                captured: frames.len(),
                planned: total,
            });
        }

        self.transition(DriverState::StitchingHandoff);
        Ok(ScrolledCapture {
            frames,
            plan: plan.clone(),
            warnings,
        })
    }

    /// Captures the visible area as it is, with the retry budget.
    pub async fn capture_single(&mut self) -> Result<EncodedImage, HostError> {
        self.capture_with_retry(0).await
    }

    async fn capture_with_retry(&mut self, step: usize) -> Result<EncodedImage, HostError> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.pacer.wait_turn().await;
            match self.host.capture_visible().await {
                Ok(image) => return Ok(image),
                Err(err) if attempt >= max_attempts => return Err(err),
                Err(err) => {
                    let delay = backoff_for(&err, &self.config.retry);
                    log::warn!(
                        "Capture failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        max_attempts,
                        err,
                        delay.as_millis()
                    );
                    attempt += 1;
                    self.transition(DriverState::Retrying { step, attempt });
                    sleep(delay).await;
                }
            }
        }
    }

    async fn fallback(
        &mut self,
        reason: CaptureError,
        selection: Option<&Selection>,
    ) -> Result<CaptureOutcome, CaptureError> {
        log::warn!("{}. Falling back to a single-shot capture.", reason);
        if let (Some(_), Some(selection)) = (self.position, selection) {
            self.restore_scroll(selection.scroll_offset()).await;
        }
        match self.capture_single().await {
            Ok(image) => {
                log::info!("Fallback capture succeeded");
                self.transition(DriverState::Done);
                Ok(CaptureOutcome::Single {
                    image,
                    fallback: Some(reason),
                    scroll_y: self.position,
                })
            }
            Err(fallback) => {
                let err = CaptureError::FallbackFailed {
                    reason: Box::new(reason),
                    fallback,
                };
                log::error!("{}", err);
                self.transition(DriverState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Scrolls back to `y`. On failure the last known offset is kept.
    async fn restore_scroll(&mut self, y: u32) {
        match self.host.scroll_to(y).await {
            Ok(ack) => {
                log::info!("Restored scroll position to {}", ack.actual_y);
                self.position = Some(ack.actual_y);
                sleep(self.config.timing.reset_settle()).await;
            }
            Err(e) => log::warn!(
                "Failed to restore scroll position to {}: {}. Page left at {:?}",
                y,
                e,
                self.position
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedHost, solid_png};
    use std::time::Duration;

    fn rate_limited() -> Result<EncodedImage, HostError> {
        Err(HostError::classify(
            "This request exceeds the MAX_CAPTURE_VISIBLE_TAB_CALLS_PER_SECOND quota.",
        ))
    }

    fn transient() -> Result<EncodedImage, HostError> {
        Err(HostError::Transient("tab busy".into()))
    }

    fn scrolled(outcome: CaptureOutcome) -> ScrolledCapture {
        match outcome {
            CaptureOutcome::Scrolled(capture) => capture,
            other => panic!("expected scrolled capture, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_page_capture_in_order() {
        let host = ScriptedHost::page(3000, 800);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let capture = scrolled(driver.capture(None).await.unwrap());

        assert_eq!(driver.state(), &DriverState::Done);
        assert_eq!(host.scrolls(), vec![0, 0, 680, 1360, 2040, 2200]);
        let indices: Vec<usize> = capture.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        let ys: Vec<u32> = capture.frames.iter().map(|f| f.captured_at_y).collect();
        assert_eq!(ys, vec![0, 680, 1360, 2040, 2200]);
        assert!(capture.warnings.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_captures_are_paced() {
        let host = ScriptedHost::page(3000, 800);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);
        driver.capture(None).await.unwrap();

        let times = host.capture_times();
        assert_eq!(times.len(), 5);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backoff_then_fallback() {
        let host = ScriptedHost::page(3000, 800)
            .with_captures(vec![rate_limited(), rate_limited(), rate_limited()]);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let outcome = driver.capture(None).await.unwrap();

        let times = host.capture_times();
        // Three attempts for step 0, then one fallback shot
        assert_eq!(times.len(), 4);
        assert!(times[1] - times[0] >= Duration::from_secs(5));
        assert!(times[2] - times[1] >= Duration::from_secs(5));
        match outcome {
            CaptureOutcome::Single {
                fallback: Some(CaptureError::InsufficientCoverage { step, source }),
                ..
            } => {
                assert_eq!(step, 0);
                assert!(matches!(source, HostError::RateLimited(_)));
            }
            other => panic!("expected fallback single shot, got {:?}", other),
        }
        assert_eq!(driver.state(), &DriverState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_within_budget() {
        let host = ScriptedHost::page(3000, 800).with_captures(vec![
            Ok(solid_png(4, 4, [1, 1, 1, 255])),
            Err(HostError::PermissionDenied("not in effect".into())),
            Ok(solid_png(4, 4, [2, 2, 2, 255])),
        ]);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let capture = scrolled(driver.capture(None).await.unwrap());
        assert_eq!(capture.frames.len(), 5);
        assert_eq!(capture.frames[1].image, solid_png(4, 4, [2, 2, 2, 255]));
        assert_eq!(host.capture_times().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_step_failure_is_skipped() {
        let ok = || Ok(solid_png(4, 4, [0, 0, 0, 255]));
        let host = ScriptedHost::page(3000, 800).with_captures(vec![
            ok(),
            ok(),
            transient(),
            transient(),
            transient(),
        ]);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let capture = scrolled(driver.capture(None).await.unwrap());
        let indices: Vec<usize> = capture.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
        assert_eq!(capture.warnings.len(), 1);
        assert!(matches!(
            capture.warnings[0],
            CaptureWarning::SkippedStep { index: 2, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_success_rate_still_returns_frames() {
        let ok = || Ok(solid_png(4, 4, [0, 0, 0, 255]));
        let mut script = vec![ok(), ok()];
        script.extend((0..9).map(|_| transient()));
        let host = ScriptedHost::page(3000, 800).with_captures(script);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let capture = scrolled(driver.capture(None).await.unwrap());
        assert_eq!(capture.frames.len(), 2);
        assert!(capture.warnings.contains(&CaptureWarning::LowSuccessRate {
            captured: 2,
            planned: 5
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_success_rate_is_not_low() {
        let ok = || Ok(solid_png(4, 4, [0, 0, 0, 255]));
        let mut script = vec![ok(), ok()];
        script.extend((0..6).map(|_| transient()));
        // 800 + 3 * 680 gives four positions
        let host = ScriptedHost::page(2840, 800).with_captures(script);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let capture = scrolled(driver.capture(None).await.unwrap());
        assert_eq!(capture.plan.positions.len(), 4);
        assert_eq!(capture.frames.len(), 2);
        assert_eq!(capture.warnings.len(), 2);
        assert!(
            capture
                .warnings
                .iter()
                .all(|w| matches!(w, CaptureWarning::SkippedStep { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_fallback_restores_scroll_offset() {
        let host = ScriptedHost::page(5000, 800)
            .with_captures(vec![transient(), transient(), transient()]);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);
        let selection = Selection::new(0, 100, 300, 200).unwrap().in_document(2000);

        let outcome = driver.capture(Some(&selection)).await.unwrap();
        // Reset, step 0, then back to where the selection was drawn
        assert_eq!(host.scrolls(), vec![0, 0, 2000]);
        match outcome {
            CaptureOutcome::Single {
                fallback: Some(CaptureError::InsufficientCoverage { step: 0, .. }),
                scroll_y,
                ..
            } => assert_eq!(scroll_y, Some(2000)),
            other => panic!("expected fallback single shot, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_page_fallback_reports_position() {
        let host = ScriptedHost::page(3000, 800)
            .with_captures(vec![transient(), transient(), transient()]);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let outcome = driver.capture(None).await.unwrap();
        assert_eq!(host.scrolls(), vec![0, 0]);
        assert!(matches!(
            outcome,
            CaptureOutcome::Single {
                scroll_y: Some(0),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_page_single_shot() {
        let host = ScriptedHost::page(840, 800);
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let outcome = driver.capture(None).await.unwrap();
        assert!(matches!(
            outcome,
            CaptureOutcome::Single {
                fallback: None,
                scroll_y: None,
                ..
            }
        ));
        assert!(host.scrolls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_page_falls_back() {
        let host = ScriptedHost::unreachable(HostError::classify(
            "Could not establish connection. Receiving end does not exist.",
        ));
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let outcome = driver.capture(None).await.unwrap();
        assert!(matches!(
            outcome,
            CaptureOutcome::Single {
                fallback: Some(CaptureError::PageUnreachable(_)),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_failure_is_terminal() {
        let host = ScriptedHost::page(3000, 800)
            .with_captures((0..6).map(|_| transient()).collect());
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let err = driver.capture(None).await.unwrap_err();
        match err {
            CaptureError::FallbackFailed { reason, fallback } => {
                assert!(matches!(*reason, CaptureError::InsufficientCoverage { step: 0, .. }));
                assert!(matches!(fallback, HostError::Transient(_)));
            }
            other => panic!("expected FallbackFailed, got {:?}", other),
        }
        assert!(matches!(driver.state(), DriverState::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scroll_still_captures() {
        let host = ScriptedHost::page(3000, 800)
            .with_scroll_error(HostError::Transient("script injection failed".into()));
        let config = CaptureConfig::default();
        let mut driver = CaptureDriver::new(&host, &config);

        let capture = scrolled(driver.capture(None).await.unwrap());
        assert_eq!(capture.frames.len(), 5);
        assert_eq!(capture.frames[4].captured_at_y, 2200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_steps_settle_longer() {
        let host = ScriptedHost::page(3000, 800);
        let mut config = CaptureConfig::default();
        config.timing.min_capture_interval_ms = 0;
        let mut driver = CaptureDriver::new(&host, &config);
        driver.capture(None).await.unwrap();

        let times = host.capture_times();
        // Interior steps settle 800ms, the last one 1200ms
        assert_eq!(times[1] - times[0], Duration::from_millis(800));
        assert_eq!(times[4] - times[3], Duration::from_millis(1200));
    }
}
