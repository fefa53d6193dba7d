//! # Consumer Egress
//!
//! Defines the receiving side of the bus: one bounded inbound queue per
//! consumer, fed by the router.

use shared_types::{DeviceId, EnrichedPacket};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// Routed packets are shared, read-only.
pub type PacketRef = Arc<EnrichedPacket>;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The router dropped its end of the queue.
    #[error("Consumer queue closed")]
    Closed,
}

/// Create the inbound queue for one consumer.
///
/// The sender goes to the router; the handle goes to the consumer worker.
#[must_use]
pub fn consumer_channel(
    id: impl Into<DeviceId>,
    capacity: usize,
) -> (mpsc::Sender<PacketRef>, ConsumerHandle) {
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = ConsumerHandle {
        id: id.into(),
        receiver,
    };
    (sender, handle)
}

/// A consumer's handle for receiving routed packets.
///
/// When dropped, the router notices on its next delivery attempt and tears
/// the consumer's subscriptions down.
#[derive(Debug)]
pub struct ConsumerHandle {
    /// Consumer id.
    id: DeviceId,

    /// Receiving half of the inbound queue.
    receiver: mpsc::Receiver<PacketRef>,
}

impl ConsumerHandle {
    /// Consumer id this handle receives for.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next packet.
    ///
    /// # Returns
    ///
    /// - `Some(packet)` - the next routed packet
    /// - `None` - the router is gone
    pub async fn recv(&mut self) -> Option<PacketRef> {
        self.receiver.recv().await
    }

    /// Wait up to `timeout` for the next packet.
    ///
    /// Returns `None` on timeout or when the router is gone.
    pub async fn poll(&mut self, timeout: Duration) -> Option<PacketRef> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(packet) => packet,
            Err(_) => {
                debug!(consumer = %self.id, "Poll timed out");
                None
            }
        }
    }

    /// Take the next packet without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(packet))` - a packet was queued
    /// - `Ok(None)` - nothing queued
    /// - `Err(SubscriptionError::Closed)` - the router is gone
    pub fn try_poll(&mut self) -> Result<Option<PacketRef>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(packet) => Ok(Some(packet)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Take every packet currently queued.
    pub fn drain(&mut self) -> Vec<PacketRef> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.receiver.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// Number of packets waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Stop accepting packets; already queued packets stay readable.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Turn the handle into a `Stream` of packets.
    #[must_use]
    pub fn into_stream(self) -> PacketStream {
        PacketStream {
            id: self.id,
            inner: ReceiverStream::new(self.receiver),
        }
    }
}

/// A stream wrapper for a consumer queue.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
#[derive(Debug)]
pub struct PacketStream {
    id: DeviceId,
    inner: ReceiverStream<PacketRef>,
}

impl PacketStream {
    /// Consumer id this stream receives for.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for PacketStream {
    type Item = PacketRef;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
