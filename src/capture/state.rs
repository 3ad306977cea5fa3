/// Capture driver states.
///
/// Idle → ResettingScroll → Capturing(i) → [Retrying(i)] → StitchingHandoff → Done | Failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    /// Not started
    Idle,
    /// Scrolled to the top, waiting for the repaint
    ResettingScroll,
    /// Scrolling to and capturing position `step` of `total`
    Capturing { step: usize, total: usize },
    /// Waiting out the backoff before capture attempt `attempt` of `step`
    Retrying { step: usize, attempt: u32 },
    /// Frames collected, ready for the compositor
    StitchingHandoff,
    /// An image was produced (possibly by the fallback)
    Done,
    /// No image could be produced
    Failed(String),
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Idle => write!(f, "Idle"),
            DriverState::ResettingScroll => write!(f, "Resetting scroll"),
            DriverState::Capturing { step, total } => {
                write!(f, "Capturing step {}/{}", step + 1, total)
            }
            DriverState::Retrying { step, attempt } => {
                write!(f, "Retrying step {} (attempt {})", step + 1, attempt)
            }
            DriverState::StitchingHandoff => write!(f, "Handing off to stitching"),
            DriverState::Done => write!(f, "Done"),
            DriverState::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(
            DriverState::Capturing { step: 0, total: 5 }.to_string(),
            "Capturing step 1/5"
        );
        assert_eq!(
            DriverState::Retrying { step: 1, attempt: 2 }.to_string(),
            "Retrying step 2 (attempt 2)"
        );
        assert_eq!(
            DriverState::Failed("no frames".into()).to_string(),
            "Failed: no frames"
        );
    }
}
