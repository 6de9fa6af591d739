//! Prometheus metrics recorder and `/metrics` rendering.
//!
//! Hub counter names live in [`kanban_hub::metrics`]; this module only adds
//! what the gateway records itself.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::ServerError;

/// Session lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_counter() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(kanban_hub::metrics::WS_CONNECTIONS_TOTAL).increment(3);
        });

        let text = render(&handle);
        assert!(text.contains("ws_connections_total 3"), "{text}");
    }

    #[test]
    fn render_without_metrics_has_no_samples() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(!output.contains("ws_connections_total"));
    }

    #[test]
    fn histogram_name_is_snake_case() {
        assert!(
            WS_CONNECTION_DURATION_SECONDS
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_')
        );
    }
}
