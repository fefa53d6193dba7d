//! # Producer Ingress
//!
//! Defines the submitting side of the bus: one bounded queue per device.

use serde_json::Value;
use shared_types::DeviceId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors from submitting a raw payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The device's ingress queue is full. The payload was not enqueued.
    #[error("Ingress queue for device {device} is full")]
    QueueFull { device: DeviceId },

    /// The router side of the queue is gone.
    #[error("Ingress queue for device {device} is closed")]
    Closed { device: DeviceId },
}

impl SubmitError {
    /// Queue-full is transient; the producer may retry or move on.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

/// Create the ingress queue for one device.
///
/// The receiver goes to the router; the handle goes to the device worker.
#[must_use]
pub fn ingress_channel(
    device: impl Into<DeviceId>,
    capacity: usize,
    submit_timeout: Duration,
) -> (ProducerHandle, mpsc::Receiver<Value>) {
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = ProducerHandle {
        device: device.into(),
        sender,
        submit_timeout,
        submitted: Arc::new(AtomicU64::new(0)),
        rejected: Arc::new(AtomicU64::new(0)),
    };
    (handle, receiver)
}

/// Handle a device worker uses to submit raw payloads.
///
/// Cheap to clone; all clones feed the same queue, so FIFO holds per handle
/// and across clones in submission order.
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    /// Device this queue belongs to.
    device: DeviceId,

    /// Sending half of the ingress queue.
    sender: mpsc::Sender<Value>,

    /// Bounded wait used by [`ProducerHandle::submit`].
    submit_timeout: Duration,

    /// Payloads accepted into the queue.
    submitted: Arc<AtomicU64>,

    /// Payloads refused because the queue was full or closed.
    rejected: Arc<AtomicU64>,
}

impl ProducerHandle {
    /// Device this handle submits for.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// - `SubmitError::QueueFull` if the queue is at capacity
    /// - `SubmitError::Closed` if the router is gone
    pub fn try_submit(&self, payload: Value) -> Result<(), SubmitError> {
        match self.sender.try_send(payload) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(device = %self.device, "Ingress queue full");
                Err(SubmitError::QueueFull {
                    device: self.device.clone(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::Closed {
                    device: self.device.clone(),
                })
            }
        }
    }

    /// Enqueue, waiting at most the configured submit timeout for room.
    ///
    /// # Errors
    ///
    /// - `SubmitError::QueueFull` if no room appeared within the timeout
    /// - `SubmitError::Closed` if the router is gone
    pub async fn submit(&self, payload: Value) -> Result<(), SubmitError> {
        match self.sender.send_timeout(payload, self.submit_timeout).await {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    device = %self.device,
                    timeout_ms = self.submit_timeout.as_millis() as u64,
                    "Ingress queue full, payload not submitted"
                );
                Err(SubmitError::QueueFull {
                    device: self.device.clone(),
                })
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::Closed {
                    device: self.device.clone(),
                })
            }
        }
    }

    /// Total payloads accepted into the queue.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Total payloads refused.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// True once the router dropped its end of the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
