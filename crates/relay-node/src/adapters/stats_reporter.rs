//! # Statistics Reporter
//!
//! Logs a statistics summary on a fixed interval until shutdown. One line
//! per (host, device) at `debug`, one aggregate line at `info`.

use std::sync::Arc;
use std::time::Duration;

use packet_router::{StatisticsQuery, StatisticsSummary};
use relay_telemetry::{log_event, log_packet_event, RelayMetrics};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const COMPONENT: &str = "stats-reporter";

/// Periodic statistics logger.
pub struct StatisticsReporter {
    query: Arc<dyn StatisticsQuery>,
    interval: Duration,
    metrics: Option<RelayMetrics>,
}

impl StatisticsReporter {
    pub fn new(query: Arc<dyn StatisticsQuery>, interval: Duration) -> Self {
        Self {
            query,
            interval,
            metrics: None,
        }
    }

    /// Also publish the device and key counts as gauges on each report.
    #[must_use]
    pub fn with_metrics(mut self, metrics: RelayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Log one report and return the summary it was built from.
    pub fn report(&self) -> StatisticsSummary {
        let summary = self.query.summary();

        for device in &summary.devices {
            log_packet_event!(
                debug,
                COMPONENT,
                "Device statistics",
                device.device,
                device.last_packet_number,
                host = %device.host_name,
                packets = device.packets,
                last_seen = %device.last_seen.to_rfc3339()
            );
        }

        let packets: u64 = summary.devices.iter().map(|d| d.packets).sum();
        log_event!(
            info,
            COMPONENT,
            "Statistics report",
            devices = summary.devices.len(),
            keys = summary.keys,
            packets = packets,
            dropped = summary.dropped_total,
            rejected = summary.rejected_total
        );

        if let Some(metrics) = &self.metrics {
            metrics.devices.set(summary.devices.len() as i64);
            metrics.stat_keys.set(summary.keys as i64);
        }
        summary
    }

    /// Report every interval until `shutdown` flips to `true` or its sender
    /// is dropped. The first report comes one interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.report();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log_event!(debug, COMPONENT, "Statistics reporter stopped");
    }
}
