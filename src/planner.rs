//! Scroll planning.
//!
//! Turns page geometry (and optionally a selection) into the ordered list of
//! scroll offsets the driver captures at. Pure: no host access, no timing.
//!
//! Two strategies:
//! - Full page: steps of `0.85 * viewport` from the top, last one clamped to
//!   `max_scroll_top`.
//! - Selection: steps based on the selection height (capped at one viewport),
//!   covering the page from the top down to the selection bottom plus a
//!   buffer. At least three positions.

use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::CaptureError;
use crate::geometry::{PageGeometry, Selection};

/// One scroll offset to capture at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollTarget {
    pub index: usize,
    pub y: u32,
    /// First or last position. Gets a longer settle delay.
    pub is_edge: bool,
}

/// How a plan was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStrategy {
    FullPage,
    Selection,
    Replay,
}

/// An immutable capture plan.
///
/// Positions start at 0 and strictly increase, and `overlap_px < scroll_step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollPlan {
    pub scroll_step: u32,
    pub overlap_px: u32,
    pub viewport_height: u32,
    pub positions: Vec<ScrollTarget>,
    pub strategy: PlanStrategy,
}

/// Result of planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The page fits (within the threshold) in one viewport.
    NoScrollNeeded,
    Scroll(ScrollPlan),
}

/// The numeric plan parameters persisted for regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPlan {
    pub scroll_step: u32,
    pub viewport_height: u32,
    pub total_steps: usize,
}

impl ScrollPlan {
    /// Rows shared by two consecutive frames at viewport scale.
    ///
    /// Frames are one viewport tall and taken `scroll_step` apart (a spread
    /// selection plan uses its spacing as the step), so this is what the
    /// stitcher has to drop from each later frame.
    pub fn stitch_overlap(&self) -> u32 {
        self.viewport_height.saturating_sub(self.scroll_step)
    }

    pub fn replay(&self) -> ReplayPlan {
        ReplayPlan {
            scroll_step: self.scroll_step,
            viewport_height: self.viewport_height,
            total_steps: self.positions.len(),
        }
    }
}

impl ReplayPlan {
    /// Rebuilds a plan from the persisted parameters.
    ///
    /// Positions are `i * scroll_step` verbatim. The page may have changed
    /// since the first run, so nothing is re-probed or re-clamped.
    pub fn to_plan(&self, overlap_ratio: f64) -> Result<ScrollPlan, CaptureError> {
        if self.scroll_step == 0 || self.viewport_height == 0 || self.total_steps == 0 {
            return Err(CaptureError::PlanningError(format!(
                "cannot replay plan with step={}, viewport={}, steps={}",
                self.scroll_step, self.viewport_height, self.total_steps
            )));
        }
        let overlap_px =
            apply_ratio(self.viewport_height, overlap_ratio).min(self.scroll_step - 1);
        let last = self.total_steps - 1;
        let positions = (0..self.total_steps)
            .map(|index| ScrollTarget {
                index,
                y: (index as u64 * self.scroll_step as u64).min(u32::MAX as u64) as u32,
                is_edge: index == 0 || index == last,
            })
            .collect();
        Ok(ScrollPlan {
            scroll_step: self.scroll_step,
            overlap_px,
            viewport_height: self.viewport_height,
            positions,
            strategy: PlanStrategy::Replay,
        })
    }
}

/// `floor(base * ratio)`, tolerant of ratios like 0.85 that are not exact in binary.
fn apply_ratio(base: u32, ratio: f64) -> u32 {
    let value = (base as f64 * ratio + 1e-9).floor();
    if value <= 0.0 { 0 } else { value.min(u32::MAX as f64) as u32 }
}

pub struct ScrollPlanner {
    config: PlannerConfig,
}

impl ScrollPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Plans a capture of `geometry`, optimized for `selection` when given.
    pub fn plan(
        &self,
        geometry: &PageGeometry,
        selection: Option<&Selection>,
    ) -> Result<PlanOutcome, CaptureError> {
        if geometry.viewport_height == 0 {
            return Err(CaptureError::PlanningError(
                "viewport height is 0".to_string(),
            ));
        }
        if !geometry.is_scrollable(self.config.scroll_threshold_px) {
            log::info!(
                "No scrolling needed: extent {}px <= {}px",
                geometry.max_scroll_top,
                self.config.scroll_threshold_px
            );
            return Ok(PlanOutcome::NoScrollNeeded);
        }

        let selection = selection.filter(|s| {
            (s.height as f64) < geometry.scroll_height as f64 * self.config.whole_page_selection_ratio
        });

        let plan = match selection {
            Some(selection) => match self.plan_selection(geometry, selection) {
                Some(plan) => plan,
                None => return Ok(PlanOutcome::NoScrollNeeded),
            },
            None => self.plan_full_page(geometry),
        };

        validate(&plan)?;
        log::info!(
            "Planned {} positions ({:?}): step={}px, overlap={}px, last={}",
            plan.positions.len(),
            plan.strategy,
            plan.scroll_step,
            plan.overlap_px,
            plan.positions.last().map(|t| t.y).unwrap_or(0)
        );
        Ok(PlanOutcome::Scroll(plan))
    }

    fn plan_full_page(&self, geometry: &PageGeometry) -> ScrollPlan {
        let (scroll_step, overlap_px) = self.step_and_overlap(geometry.viewport_height);
        let ys = stepped_positions(geometry.max_scroll_top, scroll_step);
        build_plan(
            ys,
            scroll_step,
            overlap_px,
            geometry.viewport_height,
            PlanStrategy::FullPage,
        )
    }

    /// Returns `None` when the range the selection needs fits in one viewport.
    fn plan_selection(&self, geometry: &PageGeometry, selection: &Selection) -> Option<ScrollPlan> {
        let viewport = geometry.viewport_height;
        let base = selection.height.min(viewport);
        let (scroll_step, overlap_px) = self.step_and_overlap(base);

        let buffer = apply_ratio(viewport, self.config.selection_buffer_ratio) as i64;
        let needed_end = (selection.document_bottom() + buffer - viewport as i64).max(0);
        let end = needed_end.min(geometry.max_scroll_top as i64) as u32;
        if end <= self.config.scroll_threshold_px {
            log::info!(
                "Selection range ends at {}px, within one viewport; no scrolling needed",
                end
            );
            return None;
        }

        let mut ys = stepped_positions(end, scroll_step);
        let (mut scroll_step, mut overlap_px) = (scroll_step, overlap_px);
        let min_steps = self.config.min_selection_steps;
        if ys.len() < min_steps && min_steps >= 2 {
            // The frames end up `spacing` apart, so that becomes the step
            let spacing = end.div_ceil((min_steps - 1) as u32).max(1);
            log::debug!(
                "Selection plan had {} positions, spreading {} over 0..={} every {}px",
                ys.len(),
                min_steps,
                end,
                spacing
            );
            ys = stepped_positions(end, spacing);
            scroll_step = spacing;
            overlap_px = overlap_px.min(spacing - 1);
        }

        Some(build_plan(
            ys,
            scroll_step,
            overlap_px,
            viewport,
            PlanStrategy::Selection,
        ))
    }

    /// Applies the step and overlap ratios to `base`, keeping the step at
    /// least `min(min_scroll_step_px, base)` and the overlap below the step.
    fn step_and_overlap(&self, base: u32) -> (u32, u32) {
        let floor = self.config.min_scroll_step_px.min(base);
        let step = apply_ratio(base, self.config.step_ratio).clamp(floor, base.max(floor));
        let mut overlap = apply_ratio(base, self.config.overlap_ratio);
        if step > 0 && overlap >= step {
            overlap = step - 1;
        }
        (step, overlap)
    }
}

/// `0, step, 2*step, ...` up to `end`, with the last position clamped to `end`.
fn stepped_positions(end: u32, step: u32) -> Vec<u32> {
    if step == 0 {
        return Vec::new();
    }
    let count = end.div_ceil(step) as usize + 1;
    (0..count)
        .map(|i| (i as u64 * step as u64).min(end as u64) as u32)
        .collect()
}

fn build_plan(
    ys: Vec<u32>,
    scroll_step: u32,
    overlap_px: u32,
    viewport_height: u32,
    strategy: PlanStrategy,
) -> ScrollPlan {
    let last = ys.len().saturating_sub(1);
    let positions = ys
        .into_iter()
        .enumerate()
        .map(|(index, y)| ScrollTarget {
            index,
            y,
            is_edge: index == 0 || index == last,
        })
        .collect();
    ScrollPlan {
        scroll_step,
        overlap_px,
        viewport_height,
        positions,
        strategy,
    }
}

fn validate(plan: &ScrollPlan) -> Result<(), CaptureError> {
    if plan.scroll_step == 0 {
        return Err(CaptureError::PlanningError(
            "scroll step computed as 0".to_string(),
        ));
    }
    if plan.positions.is_empty() {
        return Err(CaptureError::PlanningError(
            "plan has no positions".to_string(),
        ));
    }
    if plan.overlap_px >= plan.scroll_step {
        return Err(CaptureError::PlanningError(format!(
            "overlap {}px does not leave progress with step {}px",
            plan.overlap_px, plan.scroll_step
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> ScrollPlanner {
        ScrollPlanner::new(PlannerConfig::default())
    }

    fn scroll_plan(outcome: PlanOutcome) -> ScrollPlan {
        match outcome {
            PlanOutcome::Scroll(plan) => plan,
            PlanOutcome::NoScrollNeeded => panic!("expected a scroll plan"),
        }
    }

    fn ys(plan: &ScrollPlan) -> Vec<u32> {
        plan.positions.iter().map(|t| t.y).collect()
    }

    #[test]
    fn test_full_page_3000_by_800() {
        let geometry = PageGeometry::new(3000, 800);
        let plan = scroll_plan(planner().plan(&geometry, None).unwrap());

        assert_eq!(plan.scroll_step, 680);
        assert_eq!(plan.overlap_px, 120);
        assert_eq!(ys(&plan), vec![0, 680, 1360, 2040, 2200]);
        assert_eq!(plan.strategy, PlanStrategy::FullPage);
        assert!(plan.positions[0].is_edge);
        assert!(plan.positions[4].is_edge);
        assert!(plan.positions[1..4].iter().all(|t| !t.is_edge));
    }

    #[test]
    fn test_below_threshold_needs_no_scroll() {
        let geometry = PageGeometry::new(840, 800);
        assert_eq!(planner().plan(&geometry, None).unwrap(), PlanOutcome::NoScrollNeeded);

        let exactly = PageGeometry::new(850, 800);
        assert_eq!(planner().plan(&exactly, None).unwrap(), PlanOutcome::NoScrollNeeded);
    }

    #[test]
    fn test_zero_viewport_is_planning_error() {
        let geometry = PageGeometry::new(3000, 0);
        assert!(matches!(
            planner().plan(&geometry, None),
            Err(CaptureError::PlanningError(_))
        ));
    }

    #[test]
    fn test_full_page_coverage() {
        let planner = planner();
        for viewport in [1, 7, 100, 601, 768, 800, 1080] {
            for height in [viewport + 51, viewport * 2, viewport * 3 + 13, 25_000] {
                let geometry = PageGeometry::new(height, viewport);
                let outcome = planner.plan(&geometry, None).unwrap();
                let plan = match outcome {
                    PlanOutcome::Scroll(plan) => plan,
                    PlanOutcome::NoScrollNeeded => {
                        assert!(!geometry.is_scrollable(50));
                        continue;
                    }
                };

                assert_eq!(plan.positions[0].y, 0);
                assert!(plan.overlap_px < plan.scroll_step);
                for pair in plan.positions.windows(2) {
                    assert!(pair[0].y < pair[1].y, "not increasing: {:?}", pair);
                    assert!(
                        pair[1].y - pair[0].y <= viewport,
                        "gap between {} and {} for {}x{}",
                        pair[0].y,
                        pair[1].y,
                        height,
                        viewport
                    );
                }
                let last = plan.positions.last().unwrap();
                assert_eq!(last.y, geometry.max_scroll_top);
                assert!(last.y + viewport >= height);
            }
        }
    }

    #[test]
    fn test_selection_plan_covers_selection_with_buffer() {
        let geometry = PageGeometry::new(10_000, 800);
        let selection = Selection::new(0, 1200, 600, 1500).unwrap();
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());

        // Step is based on the selection height, capped at the viewport
        assert_eq!(plan.scroll_step, 680);
        assert_eq!(plan.strategy, PlanStrategy::Selection);

        let last = plan.positions.last().unwrap().y;
        // bottom 2700 + buffer 160 - viewport 800
        assert_eq!(last, 2060);
        assert!(last + 800 >= 2700 + 160);
        for pair in plan.positions.windows(2) {
            assert!(pair[1].y - pair[0].y <= 800);
        }
    }

    #[test]
    fn test_small_selection_gets_minimum_steps() {
        let geometry = PageGeometry::new(5000, 800);
        let selection = Selection::new(100, 500, 300, 400).unwrap();
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());

        // Range ends at 500 + 400 + 160 - 800 = 260; step 340 would give 2 positions
        assert_eq!(ys(&plan), vec![0, 130, 260]);
        assert_eq!(plan.scroll_step, 130);
        assert!(plan.overlap_px < plan.scroll_step);
    }

    #[test]
    fn test_spread_selection_stitches_without_repeats() {
        let geometry = PageGeometry::new(5000, 800);
        let selection = Selection::new(100, 500, 300, 400).unwrap();
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());

        // Frames 130px apart share 670 rows
        assert_eq!(plan.stitch_overlap(), 670);
        let covered = plan.positions.last().unwrap().y + 800;
        let frames = plan.positions.len() as u32;
        let stitched = frames * 800 - (frames - 1) * plan.stitch_overlap();
        assert_eq!(stitched, covered);

        // Replaying reproduces the spread positions
        let replayed = plan.replay().to_plan(0.15).unwrap();
        assert_eq!(ys(&replayed), vec![0, 130, 260]);
    }

    #[test]
    fn test_spread_uneven_range_keeps_uniform_spacing() {
        let geometry = PageGeometry::new(5000, 800);
        // Range ends at 501 + 400 + 160 - 800 = 261
        let selection = Selection::new(0, 501, 300, 400).unwrap();
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());
        assert_eq!(ys(&plan), vec![0, 131, 261]);
        assert_eq!(plan.scroll_step, 131);
        assert_eq!(plan.stitch_overlap(), 669);
    }

    #[test]
    fn test_selection_within_first_viewport_needs_no_scroll() {
        let geometry = PageGeometry::new(5000, 800);
        let selection = Selection::new(0, 100, 300, 200).unwrap();
        assert_eq!(
            planner().plan(&geometry, Some(&selection)).unwrap(),
            PlanOutcome::NoScrollNeeded
        );
    }

    #[test]
    fn test_document_selection_uses_scroll_offset() {
        let geometry = PageGeometry::new(5000, 800);
        let selection = Selection::new(0, 100, 300, 200).unwrap().in_document(2000);
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());
        // bottom 2300 + buffer 160 - viewport 800
        assert_eq!(plan.positions.last().unwrap().y, 1660);
    }

    #[test]
    fn test_whole_page_selection_uses_full_page_strategy() {
        let geometry = PageGeometry::new(3000, 800);
        let selection = Selection::new(0, 0, 1280, 2900).unwrap();
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());
        assert_eq!(plan.strategy, PlanStrategy::FullPage);
        assert_eq!(ys(&plan), vec![0, 680, 1360, 2040, 2200]);
    }

    #[test]
    fn test_tiny_selection_step_floor() {
        let geometry = PageGeometry::new(5000, 800);
        let selection = Selection::new(0, 1000, 50, 5).unwrap();
        let plan = scroll_plan(planner().plan(&geometry, Some(&selection)).unwrap());
        assert!(plan.scroll_step >= 5);
        assert!(plan.overlap_px < plan.scroll_step);
    }

    #[test]
    fn test_stitch_overlap_matches_frame_rows() {
        let geometry = PageGeometry::new(3000, 800);
        let plan = scroll_plan(planner().plan(&geometry, None).unwrap());
        assert_eq!(plan.stitch_overlap(), 120);
    }

    #[test]
    fn test_replay_reproduces_positions_verbatim() {
        let replay = ReplayPlan {
            scroll_step: 680,
            viewport_height: 800,
            total_steps: 5,
        };
        let plan = replay.to_plan(0.15).unwrap();
        assert_eq!(ys(&plan), vec![0, 680, 1360, 2040, 2720]);
        assert_eq!(plan.overlap_px, 120);
        assert_eq!(plan.strategy, PlanStrategy::Replay);
        assert_eq!(plan.replay(), replay);
    }

    #[test]
    fn test_replay_rejects_zero_parameters() {
        let replay = ReplayPlan {
            scroll_step: 0,
            viewport_height: 800,
            total_steps: 5,
        };
        assert!(matches!(replay.to_plan(0.15), Err(CaptureError::PlanningError(_))));
    }
}
