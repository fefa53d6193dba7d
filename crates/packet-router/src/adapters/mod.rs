//! Adapters Layer
//!
//! Connects the router to things outside this instance.
//!
//! ## Adapters
//!
//! - `spawn_relay` - forwards a consumer's packets into another instance's
//!   producer queue in wire form (one federation hop)

pub mod relay;

pub use relay::{spawn_relay, RelayStats};
