//! Page geometry probe.

use crate::error::CaptureError;
use crate::geometry::PageGeometry;
use crate::host::CaptureHost;

/// Queries the live page and reduces its metrics to a [`PageGeometry`].
///
/// Read-only. Any host failure means the page context could not be reached.
pub async fn probe<H: CaptureHost + ?Sized>(host: &H) -> Result<PageGeometry, CaptureError> {
    let metrics = host
        .probe_metrics()
        .await
        .map_err(|e| CaptureError::PageUnreachable(e.to_string()))?;
    let geometry = metrics.geometry();
    log::debug!(
        "Probed page: scroll_height={}, viewport_height={}, max_scroll_top={} (scroll_top={})",
        geometry.scroll_height,
        geometry.viewport_height,
        geometry.max_scroll_top,
        metrics.scroll_top
    );
    Ok(geometry)
}
