//! Backoff table and capture pacing.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::error::HostError;

/// Delay before retrying a capture that failed with `error`.
pub fn backoff_for(error: &HostError, config: &RetryConfig) -> Duration {
    let ms = match error {
        HostError::RateLimited(_) => config.rate_limited_backoff_ms,
        HostError::PermissionDenied(_) => config.permission_backoff_ms,
        HostError::Unreachable(_) | HostError::Transient(_) => config.transient_backoff_ms,
    };
    Duration::from_millis(ms)
}

/// Keeps capture calls at least `min_interval` apart.
///
/// The host's limit is global, so every call goes through one pacer:
/// planned steps, retries and the fallback alike.
pub(crate) struct CapturePacer {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl CapturePacer {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Waits until the next call is allowed and records it as started.
    pub(crate) async fn wait_turn(&mut self) {
        if let Some(last) = self.last_call {
            let ready = last + self.min_interval;
            if ready > Instant::now() {
                log::debug!(
                    "Pacing capture: waiting {}ms",
                    (ready - Instant::now()).as_millis()
                );
                tokio::time::sleep_until(ready).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
