//! Inbound Ports (Driving Ports)
//!
//! These traits define the API that devices, dashboards and relays use to
//! interact with the router. [`crate::RouterHandle`] implements all three.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;
use shared_types::DeviceId;

use crate::domain::{DeviceEntry, StatEntry, StatKey, StatisticsSummary, SubscriptionHandle};
use crate::error::RouterError;

/// Producer ingress (Driving Port)
#[async_trait]
pub trait PacketIngress: Send + Sync {
    /// Submit a raw payload on behalf of a registered producer, waiting
    /// briefly for room.
    ///
    /// # Errors
    ///
    /// - `RouterError::UnknownProducer` if `device` is not a producer
    /// - `RouterError::QueueFull` if no room appeared in time (recoverable)
    /// - `RouterError::ShutDown` if the router stopped
    async fn submit(&self, device: &str, payload: Value) -> Result<(), RouterError>;

    /// Submit without waiting.
    ///
    /// # Errors
    ///
    /// Same as [`PacketIngress::submit`].
    fn try_submit(&self, device: &str, payload: Value) -> Result<(), RouterError>;
}

/// Subscription management (Driving Port)
pub trait SubscriptionApi: Send + Sync {
    /// Subscribe a consumer to a pattern string.
    ///
    /// # Errors
    ///
    /// - `RouterError::MalformedPattern` if the pattern does not parse
    /// - `RouterError::UnknownSubscriber` if `subscriber` is not a consumer
    fn subscribe(&self, subscriber: &str, pattern: &str) -> Result<SubscriptionHandle, RouterError>;

    /// Remove a subscription.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscription` if the handle is not registered.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), RouterError>;

    /// Connect a producer to a consumer. `Ok(false)` means already connected.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownProducer` / `RouterError::UnknownSubscriber`.
    fn connect_as_provider(&self, producer: &str, consumer: &str) -> Result<bool, RouterError>;

    /// Producers connected to a consumer.
    ///
    /// # Errors
    ///
    /// `RouterError::UnknownSubscriber` if `consumer` is not a consumer.
    fn providers_of(&self, consumer: &str) -> Result<BTreeSet<DeviceId>, RouterError>;

    /// Every registered producer.
    fn list_providers(&self) -> Vec<DeviceEntry>;
}

/// Read-only statistics (Driving Port)
pub trait StatisticsQuery: Send + Sync {
    /// Point-in-time copy of every statistics entry.
    fn snapshot(&self) -> BTreeMap<StatKey, StatEntry>;

    /// Aggregate summary.
    fn summary(&self) -> StatisticsSummary;
}
