//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::cycle::register_cycle_metrics;

/// Installs the global recorder and returns the handle for `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    // Cycles and commands range from milliseconds to many minutes.
    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0,
        ])?
        .install_recorder()?;

    register_cycle_metrics();
    info!("Metrics system initialized");
    Ok(handle)
}
