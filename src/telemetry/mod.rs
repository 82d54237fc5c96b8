//! Telemetry module
//!
//! Logging and metrics

mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use self::metrics::{
    init_metrics, record_counter, record_exit, record_latency, set_gauge, CounterMetric, GaugeMetric,
    LatencyMetric,
};

use crate::config::TelemetryConfig;

/// Guard held for the life of the process
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;
    init_metrics(config.metrics_port)?;

    Ok(TelemetryGuard { _priv: () })
}
