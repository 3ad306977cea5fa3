//! Configuration types for capture and reconciliation.
//!
//! Loads settings from config.json at startup. Provides planner ratios,
//! settle delays, retry backoffs, and reconciliation limits. Every field has a
//! default, so a config.json only needs the values it wants to change.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<CaptureConfig> = OnceLock::new();

/// Scroll planning parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Scrollable extent (pixels) at or below which a single shot suffices
    pub scroll_threshold_px: u32,
    /// Scroll step as a fraction of the step base (viewport or selection height)
    pub step_ratio: f64,
    /// Overlap between frames as a fraction of the step base
    pub overlap_ratio: f64,
    /// Extra range captured below a selection, as a fraction of viewport height
    pub selection_buffer_ratio: f64,
    /// Minimum number of positions for a selection-optimized plan
    pub min_selection_steps: usize,
    /// Floor for the scroll step (never above the step base itself)
    pub min_scroll_step_px: u32,
    /// Selections at least this fraction of the page height use the full-page strategy
    pub whole_page_selection_ratio: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            scroll_threshold_px: 50,
            step_ratio: 0.85,
            overlap_ratio: 0.15,
            selection_buffer_ratio: 0.2,
            min_selection_steps: 3,
            min_scroll_step_px: 10,
            whole_page_selection_ratio: 0.9,
        }
    }
}

/// Fixed render-settle delays and capture spacing (milliseconds).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after resetting the scroll position to the top
    pub reset_settle_ms: u64,
    /// Wait after scrolling to an interior position
    pub render_settle_ms: u64,
    /// Wait after scrolling to the first or last position (lazy content reflows there)
    pub edge_settle_ms: u64,
    /// Minimum time between the starts of two capture calls
    pub min_capture_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reset_settle_ms: 500,
            render_settle_ms: 800,
            edge_settle_ms: 1200,
            min_capture_interval_ms: 3000,
        }
    }
}

impl TimingConfig {
    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    /// Settle delay for a scroll target.
    pub fn settle_for(&self, is_edge: bool) -> Duration {
        if is_edge {
            Duration::from_millis(self.edge_settle_ms)
        } else {
            Duration::from_millis(self.render_settle_ms)
        }
    }

    pub fn min_capture_interval(&self) -> Duration {
        Duration::from_millis(self.min_capture_interval_ms)
    }
}

/// Per-step retry budget and the backoff table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Capture attempts per step, including the first
    pub max_attempts: u32,
    /// Delay before retrying after the host's rate-limit error
    pub rate_limited_backoff_ms: u64,
    /// Delay before retrying after a permission error
    pub permission_backoff_ms: u64,
    /// Delay before retrying after any other error
    pub transient_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limited_backoff_ms: 5000,
            permission_backoff_ms: 2000,
            transient_backoff_ms: 1000,
        }
    }
}

/// Limits for the results side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Hard ceiling for re-driving a capture from persisted plan parameters
    pub regeneration_timeout_ms: u64,
    /// Wait before regeneration starts scrolling (counts against the ceiling)
    pub regeneration_warmup_ms: u64,
    /// Store reads before giving up with "no pending data"
    pub max_load_attempts: u32,
    /// Base wait between empty store reads
    pub load_backoff_base_ms: u64,
    /// Additional wait per attempt between empty store reads
    pub load_backoff_step_ms: u64,
    /// Pending records older than this are pruned
    pub stale_after_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            regeneration_timeout_ms: 30_000,
            regeneration_warmup_ms: 2000,
            max_load_attempts: 5,
            load_backoff_base_ms: 1000,
            load_backoff_step_ms: 500,
            stale_after_secs: 3600,
        }
    }
}

impl ReconcileConfig {
    pub fn regeneration_timeout(&self) -> Duration {
        Duration::from_millis(self.regeneration_timeout_ms)
    }

    /// Wait after the given (1-based) empty read.
    pub fn load_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.load_backoff_base_ms + attempt as u64 * self.load_backoff_step_ms)
    }
}

/// Complete capture configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub planner: PlannerConfig,
    pub timing: TimingConfig,
    pub retry: RetryConfig,
    pub reconcile: ReconcileConfig,
    /// Upper bound for the corner radius exposed to the result view
    pub max_corner_radius: u32,
    /// Frames larger than this in total are not persisted; the record asks for regeneration instead
    pub max_persisted_frame_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            timing: TimingConfig::default(),
            retry: RetryConfig::default(),
            reconcile: ReconcileConfig::default(),
            max_corner_radius: 50,
            max_persisted_frame_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Returns the default config path: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::app_dirs().config_file()
}

/// Loads configuration from the given file or returns defaults.
pub fn load_config_from(config_path: &Path) -> CaptureConfig {
    log::info!("Looking for config at: {}", config_path.display());

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Config loaded from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                log::warn!(
                    "Failed to read {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
            }
        }
    } else {
        log::info!("{} not found. Using default config.", config_path.display());
    }

    CaptureConfig::default()
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config(config_path: Option<&Path>) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let _ = CONFIG.set(load_config_from(&path));
}

/// Returns the global configuration, loading defaults if `init_config` was never called.
pub fn get_config() -> &'static CaptureConfig {
    CONFIG.get_or_init(|| load_config_from(&default_config_path()))
}
