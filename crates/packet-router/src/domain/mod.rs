//! Domain Layer - Pure routing logic
//!
//! This layer contains:
//! - Key path extraction over nested payloads
//! - Address pattern parsing, matching and selection
//! - Packet enrichment and per-(device, host) numbering
//! - The subscription registry and provider graph
//! - The statistics store
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod address;
pub mod enricher;
pub mod key_path;
pub mod registry;
pub mod statistics;

pub use address::{AddressError, AddressPattern, AxisMatcher, Segment};
pub use enricher::PacketEnricher;
pub use key_path::{extract_key_paths, join_path, KeyPaths, KeyTree, LeafKind};
pub use registry::{DeviceEntry, Subscription, SubscriptionHandle, SubscriptionRegistry};
pub use statistics::{DeviceSummary, StatEntry, StatKey, StatisticsSummary, StatisticsTracker};
