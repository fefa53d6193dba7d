//! Prometheus metrics for the packet relay.
//!
//! All metrics follow the naming convention: `relay_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: packets received, routed, delivered, dropped, rejected
//! - **Gauge**: devices with recorded packets, distinct statistics keys
//! - **Histogram**: deliveries per routed packet (fan-out)

use lazy_static::lazy_static;
use prometheus::{
    linear_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Process-wide registry scraped by the node
    pub static ref REGISTRY: Registry = Registry::new();
}

/// Relay metric handles. Cheap to clone; clones share the underlying series.
#[derive(Clone, Debug)]
pub struct RelayMetrics {
    pub packets_received: IntCounter,
    pub packets_routed: IntCounter,
    pub deliveries: IntCounter,
    pub packets_dropped: IntCounter,
    pub packets_rejected: IntCounter,
    pub fan_out: Histogram,
    pub devices: IntGauge,
    pub stat_keys: IntGauge,
}

impl RelayMetrics {
    /// Create every metric and register it with `registry`.
    ///
    /// # Errors
    ///
    /// `TelemetryError::MetricsInit` if a metric is invalid or already
    /// registered.
    pub fn register(registry: &Registry) -> Result<Self, TelemetryError> {
        let metrics = Self {
            packets_received: counter(
                "relay_packets_received_total",
                "Raw payloads pulled from producer queues",
            )?,
            packets_routed: counter(
                "relay_packets_routed_total",
                "Packets enriched and routed",
            )?,
            deliveries: counter(
                "relay_deliveries_total",
                "Packets pushed into consumer queues",
            )?,
            packets_dropped: counter(
                "relay_packets_dropped_total",
                "Deliveries abandoned because a consumer queue stayed full",
            )?,
            packets_rejected: counter(
                "relay_packets_rejected_total",
                "Payloads rejected at enrichment",
            )?,
            fan_out: Histogram::with_opts(
                HistogramOpts::new("relay_packet_fan_out", "Deliveries per routed packet")
                    .buckets(linear_buckets(0.0, 1.0, 9).map_err(init_error)?),
            )
            .map_err(init_error)?,
            devices: gauge("relay_devices_seen", "(host, device) pairs with recorded packets")?,
            stat_keys: gauge("relay_statistics_keys", "Distinct (host, device, key) entries")?,
        };

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.packets_received.clone()),
            Box::new(metrics.packets_routed.clone()),
            Box::new(metrics.deliveries.clone()),
            Box::new(metrics.packets_dropped.clone()),
            Box::new(metrics.packets_rejected.clone()),
            Box::new(metrics.fan_out.clone()),
            Box::new(metrics.devices.clone()),
            Box::new(metrics.stat_keys.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(init_error)?;
        }

        Ok(metrics)
    }

    /// Register with the process-wide [`REGISTRY`]. Call once.
    ///
    /// # Errors
    ///
    /// `TelemetryError::MetricsInit` if called twice.
    pub fn register_global() -> Result<Self, TelemetryError> {
        Self::register(&REGISTRY)
    }
}

/// Encode all metrics of `registry` as Prometheus text format.
///
/// # Errors
///
/// `TelemetryError::MetricsInit` if encoding fails.
pub fn encode_metrics(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(init_error)?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

fn counter(name: &str, help: &str) -> Result<IntCounter, TelemetryError> {
    IntCounter::new(name, help).map_err(init_error)
}

fn gauge(name: &str, help: &str) -> Result<IntGauge, TelemetryError> {
    IntGauge::new(name, help).map_err(init_error)
}

fn init_error(e: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsInit(e.to_string())
}
