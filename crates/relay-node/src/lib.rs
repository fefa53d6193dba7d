//! # Packet Relay Node Runtime
//!
//! Hosts one packet router instance: builds the host identity, starts the
//! distributor, attaches telemetry and runs the statistics reporter.
//!
//! ## Modular Structure
//!
//! - `config` - Environment configuration
//! - `adapters/` - Prometheus recorder and statistics reporter
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (environment only)
//! 2. Initialize logging and metrics
//! 3. Create the host identity (fresh uuid per run)
//! 4. Spawn the distributor and the statistics reporter
//! 5. Signal ready
//!
//! Devices attach in-process through [`NodeRuntime::router`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use packet_router::{Distributor, MetricsRecorder, NoOpMetrics, RouterHandle, StatisticsQuery};
use relay_telemetry::RelayMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::{PrometheusRecorder, StatisticsReporter};
pub use crate::config::NodeConfig;

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A running relay node.
pub struct NodeRuntime {
    router: RouterHandle,
    distributor: JoinHandle<()>,
    reporter: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Start the distributor and reporter on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the node or router configuration does not validate.
    pub fn start(config: NodeConfig, metrics: Option<RelayMetrics>) -> Result<Self> {
        config.validate().context("Invalid node configuration")?;
        let host = config.host_identity();
        info!("===========================================");
        info!("  Packet Relay Node v{}", env!("CARGO_PKG_VERSION"));
        info!("  Host: {} ({})", host.name, host.uuid);
        info!("===========================================");

        let recorder: Arc<dyn MetricsRecorder> = match &metrics {
            Some(m) => Arc::new(PrometheusRecorder::new(m.clone())),
            None => Arc::new(NoOpMetrics),
        };
        let (distributor, router) = Distributor::with_recorder(host, config.router.clone(), recorder)
            .context("Failed to create distributor")?;
        let distributor = tokio::spawn(distributor.run());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let query: Arc<dyn StatisticsQuery> = Arc::new(router.clone());
        let mut reporter = StatisticsReporter::new(query, config.stats_interval);
        if let Some(m) = metrics {
            reporter = reporter.with_metrics(m);
        }
        let reporter = tokio::spawn(reporter.run(shutdown_rx));

        info!(
            ingress_capacity = config.router.ingress_capacity,
            consumer_capacity = config.router.consumer_capacity,
            stats_interval_secs = config.stats_interval.as_secs(),
            "Relay node running"
        );

        Ok(Self {
            router,
            distributor,
            reporter,
            shutdown_tx,
        })
    }

    /// Handle for registering devices, subscribing and querying statistics.
    pub fn router(&self) -> &RouterHandle {
        &self.router
    }

    /// Shutdown the node gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Stop the reporter and the distributor
    /// 2. Log a final statistics summary
    /// 3. Wait for both tasks (bounded)
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        let _ = self.shutdown_tx.send(true);
        self.router.shutdown();

        let summary = self.router.summary();
        info!(
            devices = summary.devices.len(),
            keys = summary.keys,
            dropped = summary.dropped_total,
            rejected = summary.rejected_total,
            "Final statistics"
        );

        let tasks = async {
            let _ = self.reporter.await;
            let _ = self.distributor.await;
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, tasks).await.is_err() {
            warn!("Background tasks did not stop within {:?}", SHUTDOWN_GRACE);
        }

        info!("Shutdown complete");
    }
}
