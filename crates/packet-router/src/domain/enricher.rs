//! # Packet Enricher
//!
//! Turns a raw payload into an addressable packet: device, device module,
//! host, packet number and receive time on top, payload untouched.
//!
//! A raw value that already carries metadata under the reserved key came
//! from another instance. Its previous top-level metadata is appended to the
//! provenance list (oldest first, never truncated) and then replaced.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared_types::{split_wire, DeviceId, EnrichedPacket, HostIdentity, PacketError, PacketMeta, Payload};

/// Owns the per-(device, host) packet counters.
///
/// One enricher belongs to one distributor, which is the only caller.
#[derive(Debug, Default)]
pub struct PacketEnricher {
    /// (device, host uuid) -> next packet number
    counters: HashMap<(DeviceId, String), u64>,
}

impl PacketEnricher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrich a raw value pulled from a producer queue.
    ///
    /// # Errors
    ///
    /// - `PacketError::NotAMapping` if `raw` is not a mapping
    /// - `PacketError::MalformedMetadata` if the reserved key does not parse
    pub fn enrich(
        &mut self,
        raw: Value,
        device: &str,
        device_module: &str,
        host: &Arc<HostIdentity>,
        received_at: DateTime<Utc>,
    ) -> Result<EnrichedPacket, PacketError> {
        let (payload, previous) = split_wire(raw)?;
        Ok(self.stamp(payload, previous, device, device_module, host, received_at))
    }

    /// Re-enrich an already typed packet for another hop.
    #[must_use]
    pub fn relay(
        &mut self,
        packet: EnrichedPacket,
        device: &str,
        device_module: &str,
        host: &Arc<HostIdentity>,
        received_at: DateTime<Utc>,
    ) -> EnrichedPacket {
        self.stamp(
            packet.payload,
            Some(packet.meta),
            device,
            device_module,
            host,
            received_at,
        )
    }

    /// Packets numbered so far for (device, host uuid).
    #[must_use]
    pub fn enriched_count(&self, device: &str, host_uuid: &str) -> u64 {
        self.counters
            .get(&(device.to_string(), host_uuid.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn stamp(
        &mut self,
        payload: Payload,
        previous: Option<PacketMeta>,
        device: &str,
        device_module: &str,
        host: &Arc<HostIdentity>,
        received_at: DateTime<Utc>,
    ) -> EnrichedPacket {
        let provenance = match previous {
            Some(previous) => {
                let hop = previous.as_provenance();
                let mut provenance = previous.provenance;
                provenance.push(hop);
                provenance
            }
            None => Vec::new(),
        };

        EnrichedPacket {
            meta: PacketMeta {
                device: device.to_string(),
                device_module: device_module.to_string(),
                host: Arc::clone(host),
                packet_number: self.next_packet_number(device, &host.uuid),
                received_at,
                provenance,
            },
            payload,
        }
    }

    fn next_packet_number(&mut self, device: &str, host_uuid: &str) -> u64 {
        let counter = self
            .counters
            .entry((device.to_string(), host_uuid.to_string()))
            .or_insert(0);
        let number = *counter;
        *counter += 1;
        number
    }
}
