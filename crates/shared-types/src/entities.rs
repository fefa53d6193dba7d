//! # Packet Entities
//!
//! Defines the packet data model shared by every crate in the workspace.
//!
//! ## Clusters
//!
//! - **Identity**: `HostIdentity`, `DeviceId`
//! - **Packet**: `Payload`, `PacketMeta`, `EnrichedPacket`
//! - **Relay**: `ProvenanceEntry`, the `_packet` wire key

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::PacketError;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Logical name of a device within one host instance.
pub type DeviceId = String;

/// Immutable description of one running instance.
///
/// Created once at startup and shared by `Arc` across every packet the
/// instance enriches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostIdentity {
    /// Human readable host name (not necessarily unique).
    pub name: String,
    /// Unique id of this instance.
    pub uuid: String,
    /// Start time of the instance.
    pub started_at: DateTime<Utc>,
    /// Network address the instance is reachable at, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
}

impl HostIdentity {
    /// Create an identity with a fresh v4 uuid, started now.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uuid(name, Uuid::new_v4().to_string(), Utc::now())
    }

    /// Create an identity with explicit fields.
    #[must_use]
    pub fn with_uuid(
        name: impl Into<String>,
        uuid: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            started_at,
            addr: None,
        }
    }

    /// Attach a network address.
    #[must_use]
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// True if `ident` is this host's name or uuid (case-sensitive).
    #[must_use]
    pub fn is_named(&self, ident: &str) -> bool {
        self.name == ident || self.uuid == ident
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.name, self.uuid)
    }
}

// =============================================================================
// CLUSTER B: PACKET
// =============================================================================

/// Schema-less packet payload: string keys to arbitrarily nested values.
///
/// Key order is insertion order (`serde_json` is built with `preserve_order`).
pub type Payload = Map<String, Value>;

/// Reserved top-level key carrying packet metadata in the wire form.
pub const META_KEY: &str = "_packet";

/// One prior hop of a relayed packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Host that enriched the packet at this hop.
    pub host: Arc<HostIdentity>,
    /// Device name the packet carried at this hop.
    pub device: DeviceId,
    /// Packet number assigned at this hop.
    pub packet_number: u64,
    /// When the hop pulled the packet from its producer queue.
    pub received_at: DateTime<Utc>,
}

/// Enrichment metadata attached to a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketMeta {
    /// Producing device's logical name.
    pub device: DeviceId,
    /// Device type identifier.
    pub device_module: String,
    /// Instance that most recently enriched the packet.
    pub host: Arc<HostIdentity>,
    /// Per-(device, host) sequence number.
    pub packet_number: u64,
    /// When the payload was pulled from its producer queue.
    pub received_at: DateTime<Utc>,
    /// Prior hops, oldest first. Append-only.
    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
}

impl PacketMeta {
    /// The provenance entry describing this hop.
    #[must_use]
    pub fn as_provenance(&self) -> ProvenanceEntry {
        ProvenanceEntry {
            host: Arc::clone(&self.host),
            device: self.device.clone(),
            packet_number: self.packet_number,
            received_at: self.received_at,
        }
    }
}

/// A payload plus its enrichment metadata.
///
/// Packets are handed to consumers behind an `Arc` and are immutable from
/// then on; a consumer that wants to edit the payload clones it first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPacket {
    /// Enrichment metadata.
    pub meta: PacketMeta,
    /// The payload exactly as produced.
    pub payload: Payload,
}

impl EnrichedPacket {
    /// Producing device.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.meta.device
    }

    /// Device type identifier.
    #[must_use]
    pub fn device_module(&self) -> &str {
        &self.meta.device_module
    }

    /// Most recent enriching host.
    #[must_use]
    pub fn host(&self) -> &HostIdentity {
        &self.meta.host
    }

    /// Per-(device, host) sequence number.
    #[must_use]
    pub fn packet_number(&self) -> u64 {
        self.meta.packet_number
    }

    /// Time the payload was pulled from its producer queue.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.meta.received_at
    }

    /// Prior hops, oldest first.
    #[must_use]
    pub fn provenance(&self) -> &[ProvenanceEntry] {
        &self.meta.provenance
    }

    /// Number of relay hops this packet has been through.
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.meta.provenance.len()
    }

    /// The host that first enriched this packet.
    #[must_use]
    pub fn origin_host(&self) -> &HostIdentity {
        self.meta
            .provenance
            .first()
            .map_or(&self.meta.host, |hop| &hop.host)
    }

    /// Wire form: the payload with metadata under [`META_KEY`].
    ///
    /// # Errors
    ///
    /// `PacketError::MetadataEncoding` if the metadata does not serialize.
    pub fn to_wire(&self) -> Result<Value, PacketError> {
        self.clone().into_wire()
    }

    /// Consuming variant of [`EnrichedPacket::to_wire`].
    ///
    /// # Errors
    ///
    /// `PacketError::MetadataEncoding` if the metadata does not serialize.
    pub fn into_wire(self) -> Result<Value, PacketError> {
        let meta = encode_meta(&self.meta)?;
        let mut map = self.payload;
        map.insert(META_KEY.to_string(), meta);
        Ok(Value::Object(map))
    }

    /// Parse a wire form produced by [`EnrichedPacket::to_wire`].
    ///
    /// # Errors
    ///
    /// - `PacketError::NotAMapping` if `value` is not an object
    /// - `PacketError::MissingMetadata` if there is no metadata key
    /// - `PacketError::MalformedMetadata` if the metadata does not parse
    pub fn from_wire(value: Value) -> Result<Self, PacketError> {
        match split_wire(value)? {
            (payload, Some(meta)) => Ok(Self { meta, payload }),
            (_, None) => Err(PacketError::MissingMetadata { key: META_KEY }),
        }
    }
}

/// Split a raw value into its payload and optional metadata.
///
/// # Errors
///
/// - `PacketError::NotAMapping` if `value` is not an object
/// - `PacketError::MalformedMetadata` if the reserved key is present but invalid
pub fn split_wire(value: Value) -> Result<(Payload, Option<PacketMeta>), PacketError> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(PacketError::NotAMapping {
                kind: value_kind(&other),
            })
        }
    };

    let Some(raw_meta) = map.shift_remove(META_KEY) else {
        return Ok((map, None));
    };

    let meta = serde_json::from_value::<PacketMeta>(raw_meta).map_err(|e| {
        PacketError::MalformedMetadata {
            key: META_KEY,
            reason: e.to_string(),
        }
    })?;

    Ok((map, Some(meta)))
}

fn encode_meta<T: Serialize>(meta: &T) -> Result<Value, PacketError> {
    serde_json::to_value(meta).map_err(|e| PacketError::MetadataEncoding {
        key: META_KEY,
        reason: e.to_string(),
    })
}

/// Short name of a JSON value's kind, for error messages.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
