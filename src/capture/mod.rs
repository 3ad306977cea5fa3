//! Capture orchestration against a [`CaptureHost`](crate::host::CaptureHost).
//!
//! This module provides:
//! - The driver state machine (`CaptureDriver`, `DriverState`)
//! - Frame and outcome types handed to the compositor
//! - The retry backoff table and capture pacing

pub mod driver;
pub mod frame;
pub mod retry;
pub mod state;

pub use driver::CaptureDriver;
pub use frame::{CaptureFrame, CaptureOutcome, CaptureWarning, ScrolledCapture};
pub use retry::backoff_for;
pub use state::DriverState;
