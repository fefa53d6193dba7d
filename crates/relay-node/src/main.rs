//! # Packet Relay Node
//!
//! Entry point: telemetry, configuration, runtime, ctrl-c, shutdown.

use anyhow::{Context, Result};
use relay_node::{NodeConfig, NodeRuntime};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let metrics = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env().context("Invalid node configuration")?;
    let runtime = NodeRuntime::start(config, metrics)?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    runtime.shutdown().await;
    Ok(())
}
