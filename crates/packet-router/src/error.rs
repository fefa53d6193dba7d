//! Error types for the packet router.

use shared_bus::SubmitError;
use shared_types::{DeviceId, PacketError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{AddressError, SubscriptionHandle};

/// Errors returned synchronously by router operations.
///
/// Per-packet failures inside the routing loop never surface here; they are
/// logged and counted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Raw payload is not a mapping or carries malformed metadata.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PacketError),

    /// No consumer registered under this id.
    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(DeviceId),

    /// No producer registered under this id.
    #[error("Unknown producer: {0}")]
    UnknownProducer(DeviceId),

    /// No device registered under this id in any role.
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// Subscription handle not (or no longer) registered.
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionHandle),

    /// Device already registered in this role.
    #[error("Device {device} is already registered as {role}")]
    DuplicateDevice { device: DeviceId, role: &'static str },

    /// Device id cannot be used in address patterns.
    #[error("Invalid device id `{device}`: {reason}")]
    InvalidDeviceId { device: DeviceId, reason: &'static str },

    /// Address pattern string does not parse.
    #[error(transparent)]
    MalformedPattern(#[from] AddressError),

    /// Ingress queue full; the payload was not accepted.
    #[error("Ingress queue for device {0} is full")]
    QueueFull(DeviceId),

    /// Invalid router configuration.
    #[error("Invalid router configuration: {0}")]
    Config(#[from] ConfigError),

    /// The distributor has stopped.
    #[error("Router is shut down")]
    ShutDown,
}

impl RouterError {
    /// True for lookups of ids that are not registered.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownSubscriber(_)
                | Self::UnknownProducer(_)
                | Self::UnknownDevice(_)
                | Self::UnknownSubscription(_)
        )
    }

    /// True if retrying later may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueFull(_))
    }
}

impl From<SubmitError> for RouterError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::QueueFull { device } => Self::QueueFull(device),
            SubmitError::Closed { .. } => Self::ShutDown,
        }
    }
}

/// Result alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
