//! # Packet Router
//!
//! Enrichment, hierarchical addressing and pub/sub distribution of small
//! structured packets produced by many concurrently running devices.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `extract_key_paths`: payload -> ordered key paths + lookup tree
//!   - `AddressPattern`: `keypath@device@host` parsing, matching, selection
//!   - `PacketEnricher`: metadata, packet numbers, provenance
//!   - `SubscriptionRegistry`: devices, subscriptions, provider edges
//!   - `StatisticsTracker`: per-(host, device, key) counters
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `PacketIngress`, `SubscriptionApi`, `StatisticsQuery`
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `Distributor`: the routing loop
//!   - `RouterHandle`: implements every inbound port
//!
//! - **Adapters Layer** (`adapters/`): `spawn_relay` for federation hops
//!
//! ## Invariants
//!
//! - Packet numbers increase strictly per (device, host)
//! - Provenance is append-only, oldest hop first
//! - Packets reach consumers unmodified behind an `Arc`
//! - A full consumer queue drops for that consumer only; producers never
//!   see it
//!
//! ## Usage Example
//!
//! ```ignore
//! use packet_router::{Distributor, RouterConfig};
//! use shared_types::HostIdentity;
//!
//! let (router, _task) = Distributor::spawn(HostIdentity::new("lab"), RouterConfig::default())?;
//! let ctd = router.register_producer("ctd", "serial")?;
//! let mut plot = router.register_consumer("plot")?;
//! router.subscribe("plot", "temp@ctd")?;
//!
//! ctd.submit(serde_json::json!({"temp": 12.5})).await?;
//! let packet = plot.recv().await;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{spawn_relay, RelayStats};
pub use config::{ConfigError, RouterConfig};
pub use domain::{
    extract_key_paths, AddressError, AddressPattern, DeviceEntry, KeyPaths, PacketEnricher,
    StatEntry, StatKey, StatisticsSummary, StatisticsTracker, Subscription, SubscriptionHandle,
    SubscriptionRegistry,
};
pub use error::RouterError;
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{PacketIngress, StatisticsQuery, SubscriptionApi};
pub use service::{Distributor, RouterHandle};
