//! Structured logging setup.
//!
//! One global `tracing` subscriber: an `EnvFilter` built from the configured
//! level plus either a pretty console layer (development) or a JSON layer
//! (containers, log shippers). JSON lines carry:
//! - `timestamp`, `level`, `target`, `threadId`
//! - `filename` and `line_number`
//! - the event's structured fields (`device`, `subscriber`, `packet_number`, ...)

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Build the level filter for `config`.
///
/// # Errors
///
/// `TelemetryError::LoggingInit` if the directive does not parse.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Install the global subscriber.
///
/// # Errors
///
/// `TelemetryError::LoggingInit` if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    let json_layer = (config.console_output && config.json_logs).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Log an event tagged with the emitting component.
///
/// ```rust,ignore
/// log_event!(info, "reporter", "Statistics report", devices = 3);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a packet-related event with standard coordinates.
///
/// ```rust,ignore
/// log_packet_event!(debug, "relay", "Packet forwarded", packet.device(), packet.packet_number());
/// ```
#[macro_export]
macro_rules! log_packet_event {
    ($level:ident, $component:expr, $msg:expr, $device:expr, $packet_number:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            device = %$device,
            packet_number = $packet_number,
            $($($field)*,)?
            $msg
        )
    };
}
