//! # Relay Telemetry
//!
//! Logging and metrics for packet relay nodes.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber with env filter, pretty or JSON output
//! - **Metrics**: Prometheus counters, gauges and a fan-out histogram
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let metrics = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `packet-relay` | Service name in the startup log |
//! | `RELAY_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `RELAY_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `RELAY_METRICS_ENABLED` | `true` | Register Prometheus metrics |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{encode_metrics, RelayMetrics, REGISTRY};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and, if enabled, the global metrics.
///
/// # Errors
///
/// `TelemetryError` if either part fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<RelayMetrics>, TelemetryError> {
    init_logging(config)?;
    if !config.metrics_enabled {
        tracing::info!("Prometheus metrics disabled");
        return Ok(None);
    }
    RelayMetrics::register_global().map(Some)
}
