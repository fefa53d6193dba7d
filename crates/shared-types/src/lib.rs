//! # Shared Types Crate
//!
//! This crate contains the packet entities shared by the bus, the router and
//! the node runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the packet model and its wire form live here.
//! - **Payload Integrity**: enrichment never edits payload contents; metadata
//!   travels beside the payload, and under one reserved key on the wire.
//! - **Append-only Provenance**: each relay hop adds one entry, oldest first.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
