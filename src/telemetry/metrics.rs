//! Prometheus metrics
//!
//! Thin wrappers over the `metrics` facade so call sites name a metric by
//! enum instead of by string. Without an installed exporter these are no-ops.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Entry order submit to confirmed outcome
    EntryRoundTrip,
    /// Exit order submit to confirmed outcome
    ExitRoundTrip,
    /// Order book fetch for an entry check
    OrderBook,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Realized session P&L
    SessionPnl,
    /// Bankroll after settled trades
    Bankroll,
    /// Current interval move in percent
    MovePct,
    /// 1 when the circuit breaker has tripped
    CircuitBreaker,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Price ticks handled
    Ticks,
    /// Entry orders filled
    Entries,
    /// Orders that ended with nothing matched
    Unfilled,
    /// Fill confirmations that hit their deadline
    OrderTimeouts,
    /// Sell orders that failed or did not fill
    SellFailures,
    /// Early exits
    Exits,
    /// Intervals settled with a position
    Resolutions,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::EntryRoundTrip => "polysniper_entry_round_trip_ms",
        LatencyMetric::ExitRoundTrip => "polysniper_exit_round_trip_ms",
        LatencyMetric::OrderBook => "polysniper_orderbook_fetch_ms",
    };

    ::metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::SessionPnl => "polysniper_session_pnl_usd",
        GaugeMetric::Bankroll => "polysniper_bankroll_usd",
        GaugeMetric::MovePct => "polysniper_interval_move_pct",
        GaugeMetric::CircuitBreaker => "polysniper_circuit_breaker",
    };

    ::metrics::gauge!(metric_name).set(value);
}

/// Increment a counter
pub fn record_counter(metric: CounterMetric, n: u64) {
    let metric_name = match metric {
        CounterMetric::Ticks => "polysniper_ticks_total",
        CounterMetric::Entries => "polysniper_entries_total",
        CounterMetric::Unfilled => "polysniper_unfilled_orders_total",
        CounterMetric::OrderTimeouts => "polysniper_order_timeouts_total",
        CounterMetric::SellFailures => "polysniper_sell_failures_total",
        CounterMetric::Exits => "polysniper_exits_total",
        CounterMetric::Resolutions => "polysniper_resolutions_total",
    };

    ::metrics::counter!(metric_name).increment(n);
}

/// Count an early exit under its reason label
pub fn record_exit(reason: &'static str) {
    ::metrics::counter!("polysniper_exits_by_reason_total", "reason" => reason).increment(1);
}

/// Serve `/metrics` on `port`; 0 leaves the exporter off.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        tracing::debug!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_counter(CounterMetric::Ticks, 3);
        set_gauge(GaugeMetric::SessionPnl, -2.5);
        record_latency(LatencyMetric::OrderBook, Duration::from_millis(40));
        record_exit("take_profit");
    }

    #[test]
    fn test_disabled_exporter() {
        assert!(init_metrics(0).is_ok());
    }
}
