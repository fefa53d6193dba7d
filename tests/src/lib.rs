//! # Packet Relay Test Suite
//!
//! Unified test crate for flows that span more than one crate.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── fanout.rs        # one producer, many subscribers, selection
//! │   ├── federation.rs    # hub -> hub relays, provenance, host axis
//! │   ├── aggregation.rs   # statistics across devices and hosts
//! │   └── backpressure.rs  # slow consumers, queue-full drops
//! └── benches/
//!     └── routing_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::federation
//! cargo bench -p relay-tests
//! ```

#![allow(dead_code)]

pub mod integration;
