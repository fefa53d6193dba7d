//! # Error Types
//!
//! Defines error types used across crates.

use thiserror::Error;

/// Errors raised while interpreting a raw payload or writing its wire form.
///
/// Every parsing variant is an "invalid payload": the packet is rejected and
/// dropped, the producer is told why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// The raw payload is not a mapping.
    #[error("Invalid payload: expected a mapping, got {kind}")]
    NotAMapping { kind: &'static str },

    /// The reserved metadata key is present but does not parse.
    #[error("Invalid payload: malformed `{key}` metadata: {reason}")]
    MalformedMetadata { key: &'static str, reason: String },

    /// A wire packet was expected but carries no metadata.
    #[error("Invalid payload: missing `{key}` metadata")]
    MissingMetadata { key: &'static str },

    /// The metadata could not be serialized into the wire form.
    #[error("Failed to encode `{key}` metadata: {reason}")]
    MetadataEncoding { key: &'static str, reason: String },
}
