//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Accepted first-time launch clicks (counter).
pub const LAUNCH_CLICKS_TOTAL: &str = "launch_clicks_total";
/// Threshold crossings (counter).
pub const LAUNCHES_TOTAL: &str = "launches_total";
/// Session resets (counter).
pub const RESETS_TOTAL: &str = "resets_total";
/// Reveal acknowledgements that changed state (counter).
pub const REVEALS_TOTAL: &str = "reveals_total";
/// Rejected frames (counter, labels: reason).
pub const COMMANDS_REJECTED_TOTAL: &str = "commands_rejected_total";
/// Current click count (gauge).
pub const LAUNCH_CLICK_COUNT: &str = "launch_click_count";
/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Peers dropped during fan-out (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
