//! ArcShot capture core.
//!
//! Captures web pages that may be taller than one viewport by scrolling,
//! capturing each viewport under the host's rate limit, and stitching the
//! frames into one image. Also crops to user selections, rounds corners,
//! and reconciles the competing "capture finished" records that different
//! entry points leave in the shared store.
//!
//! The host platform (page scripting, the visible-area capture primitive) is
//! reached only through [`host::CaptureHost`].

pub mod capture;
pub mod compose;
pub mod config;
pub mod error;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod paths;
pub mod planner;
pub mod reconcile;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CaptureDriver, CaptureFrame, CaptureOutcome, CaptureWarning, DriverState};
pub use compose::EncodedImage;
pub use config::CaptureConfig;
pub use error::{CaptureError, CompositeError, HostError, ReconcileError, StoreError};
pub use geometry::{CoordinateSpace, PageGeometry, PageMetrics, PixelRect, Selection};
pub use host::{CaptureHost, ScrollAck};
pub use planner::{PlanOutcome, ReplayPlan, ScrollPlan, ScrollPlanner, ScrollTarget};
pub use reconcile::{
    FileStore, FinalImage, MemoryStore, PendingPayload, PendingResult, PendingStore, Reconciled,
    ResultReconciler,
};
pub use session::{CaptureRequest, CaptureSession};
