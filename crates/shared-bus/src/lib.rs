//! # Shared Bus - Queues Between Devices and the Router
//!
//! Every device talks to the router through message passing only.
//!
//! ## Queue Layout
//!
//! ```text
//! ┌──────────────┐  submit()   ┌──────────────┐  poll()   ┌──────────────┐
//! │  Producer    │ ──────────▶ │    Router    │ ────────▶ │  Consumer    │
//! │  (device)    │  ingress    │ (distributor)│  inbound  │  (device)    │
//! └──────────────┘  queue      └──────────────┘  queue    └──────────────┘
//! ```
//!
//! - One bounded ingress queue per producing device (`ProducerHandle`)
//! - One bounded inbound queue per consumer (`ConsumerHandle`)
//! - Packets cross to consumers as `Arc<EnrichedPacket>`, never mutated

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{ingress_channel, ProducerHandle, SubmitError};
pub use subscriber::{consumer_channel, ConsumerHandle, PacketRef, PacketStream, SubscriptionError};

/// Maximum payloads buffered per producer before backpressure.
pub const DEFAULT_INGRESS_CAPACITY: usize = 1000;

/// Maximum packets buffered per consumer before backpressure.
pub const DEFAULT_CONSUMER_CAPACITY: usize = 1000;
