//! Relay forwarder
//!
//! Pumps every packet a consumer receives into a producer queue of another
//! router, in wire form. The receiving router sees the reserved metadata key,
//! appends a provenance hop and re-enriches the packet as its own.
//!
//! ```text
//! hub A                                   hub B
//! ctd ──▶ [router A] ──▶ relay consumer ──▶ relay producer ──▶ [router B] ──▶ plot
//!                            (wire form, provenance +1)
//! ```

use serde::Serialize;
use shared_bus::{ConsumerHandle, ProducerHandle};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Totals reported when a relay stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub forwarded: u64,
    /// Packets the upstream queue had no room for, or that did not encode.
    pub dropped: u64,
}

/// Spawn a task forwarding `consumer` into `upstream`.
///
/// The task ends when either side closes and returns its totals.
pub fn spawn_relay(consumer: ConsumerHandle, upstream: ProducerHandle) -> JoinHandle<RelayStats> {
    tokio::spawn(run_relay(consumer, upstream))
}

async fn run_relay(mut consumer: ConsumerHandle, upstream: ProducerHandle) -> RelayStats {
    let mut stats = RelayStats::default();
    info!(consumer = consumer.id(), upstream = upstream.device(), "Relay started");

    while let Some(packet) = consumer.recv().await {
        let wire = match packet.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                stats.dropped += 1;
                warn!(
                    device = packet.device(),
                    packet_number = packet.packet_number(),
                    error = %e,
                    "Relay could not encode packet, dropped"
                );
                continue;
            }
        };
        match upstream.submit(wire).await {
            Ok(()) => {
                stats.forwarded += 1;
                debug!(
                    device = packet.device(),
                    packet_number = packet.packet_number(),
                    "Packet relayed"
                );
            }
            Err(e) if e.is_recoverable() => {
                stats.dropped += 1;
                warn!(upstream = upstream.device(), error = %e, "Relay dropped packet");
            }
            Err(e) => {
                info!(upstream = upstream.device(), error = %e, "Upstream closed, relay stopping");
                break;
            }
        }
    }

    info!(
        consumer = consumer.id(),
        forwarded = stats.forwarded,
        dropped = stats.dropped,
        "Relay stopped"
    );
    stats
}
