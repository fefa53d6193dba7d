//! # Adapter Implementations
//!
//! Concrete implementations plugged into the router's ports:
//! - `PrometheusRecorder` implements `packet_router::MetricsRecorder`
//! - `StatisticsReporter` drives `packet_router::StatisticsQuery` on a timer

pub mod metrics;
pub mod stats_reporter;

pub use metrics::PrometheusRecorder;
pub use stats_reporter::StatisticsReporter;
