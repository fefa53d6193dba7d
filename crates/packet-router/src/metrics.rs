//! Metrics hooks for the routing loop
//!
//! Provides counters for monitoring throughput, fan-out and loss.
//!
//! ## Usage
//!
//! ```ignore
//! use packet_router::metrics::{Metrics, MetricsRecorder};
//!
//! let metrics = Metrics::new();
//! metrics.record_received();
//! metrics.record_routed(3);
//! assert_eq!(metrics.snapshot().deliveries, 3);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for the distributor
///
/// Thread-safe counters, written by the routing loop only.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Raw payloads pulled from producer queues
    pub packets_received: AtomicU64,
    /// Packets enriched and routed (possibly to nobody)
    pub packets_routed: AtomicU64,
    /// Packets pushed into consumer queues
    pub deliveries: AtomicU64,
    /// Deliveries abandoned because a consumer queue stayed full
    pub packets_dropped: AtomicU64,
    /// Payloads rejected at enrichment
    pub packets_rejected: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payload pulled from an ingress queue
    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a routed packet and its number of successful deliveries
    pub fn record_routed(&self, delivered: usize) {
        self.packets_routed.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
    }

    /// Record a delivery dropped on a full consumer queue
    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload rejected at enrichment
    pub fn record_rejected(&self) {
        self.packets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_routed: self.packets_routed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.packets_received.store(0, Ordering::Relaxed);
        self.packets_routed.store(0, Ordering::Relaxed);
        self.deliveries.store(0, Ordering::Relaxed);
        self.packets_dropped.store(0, Ordering::Relaxed);
        self.packets_rejected.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_routed: u64,
    pub deliveries: u64,
    pub packets_dropped: u64,
    pub packets_rejected: u64,
}

impl MetricsSnapshot {
    /// Average deliveries per routed packet
    #[must_use]
    pub fn fan_out(&self) -> f64 {
        if self.packets_routed == 0 {
            0.0
        } else {
            self.deliveries as f64 / self.packets_routed as f64
        }
    }
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to integrate with external metrics systems
/// like Prometheus.
pub trait MetricsRecorder: Send + Sync {
    /// Record a payload pulled from an ingress queue
    fn record_received(&self);

    /// Record a routed packet and its number of successful deliveries
    fn record_routed(&self, delivered: usize);

    /// Record a delivery dropped on a full consumer queue
    fn record_dropped(&self);

    /// Record a payload rejected at enrichment
    fn record_rejected(&self);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Debug, Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_received(&self) {}
    fn record_routed(&self, _: usize) {}
    fn record_dropped(&self) {}
    fn record_rejected(&self) {}
}

impl MetricsRecorder for Metrics {
    fn record_received(&self) {
        Metrics::record_received(self);
    }

    fn record_routed(&self, delivered: usize) {
        Metrics::record_routed(self, delivered);
    }

    fn record_dropped(&self) {
        Metrics::record_dropped(self);
    }

    fn record_rejected(&self) {
        Metrics::record_rejected(self);
    }
}
