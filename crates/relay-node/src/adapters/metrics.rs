//! # Prometheus Metrics Recorder
//!
//! Forwards the distributor's counters to the Prometheus series registered
//! by `relay-telemetry`.

use packet_router::MetricsRecorder;
use relay_telemetry::RelayMetrics;

/// `MetricsRecorder` backed by Prometheus counters.
#[derive(Clone, Debug)]
pub struct PrometheusRecorder {
    metrics: RelayMetrics,
}

impl PrometheusRecorder {
    pub fn new(metrics: RelayMetrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }
}

impl MetricsRecorder for PrometheusRecorder {
    fn record_received(&self) {
        self.metrics.packets_received.inc();
    }

    fn record_routed(&self, delivered: usize) {
        self.metrics.packets_routed.inc();
        self.metrics.deliveries.inc_by(delivered as u64);
        self.metrics.fan_out.observe(delivered as f64);
    }

    fn record_dropped(&self) {
        self.metrics.packets_dropped.inc();
    }

    fn record_rejected(&self) {
        self.metrics.packets_rejected.inc();
    }
}
